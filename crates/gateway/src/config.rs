//! Configuration for the gateway
//!
//! Configuration can be loaded from a TOML file and/or environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};
use streamcast_relay::gst::GstEngineConfig;

use crate::ports::DEFAULT_PORT_BASE;

/// Main configuration for the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Port allocation
    #[serde(default)]
    pub ports: PortsConfig,

    /// Relay engine configuration
    #[serde(default)]
    pub engine: GstEngineConfig,
}

/// Port allocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortsConfig {
    /// First ingest port the allocator hands out
    #[serde(default = "default_port_base")]
    pub base: u16,
}

fn default_port_base() -> u16 {
    DEFAULT_PORT_BASE
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            base: default_port_base(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ports: PortsConfig::default(),
            engine: GstEngineConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: GatewayConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = GatewayConfig::default();

        if let Ok(base) = std::env::var("STREAMCAST_PORT_BASE") {
            if let Ok(b) = base.parse() {
                config.ports.base = b;
            }
        }
        if let Ok(binary) = std::env::var("STREAMCAST_LAUNCH_BINARY") {
            config.engine.launch_binary = binary;
        }
        if let Ok(host) = std::env::var("STREAMCAST_INGEST_HOST") {
            config.engine.ingest_host = host;
        }
        if let Ok(bitrate) = std::env::var("STREAMCAST_AAC_BITRATE") {
            if let Ok(b) = bitrate.parse() {
                config.engine.aac_bitrate = b;
            }
        }
        if let Ok(grace) = std::env::var("STREAMCAST_SHUTDOWN_GRACE_MS") {
            if let Ok(g) = grace.parse() {
                config.engine.shutdown_grace_ms = g;
            }
        }

        config
    }

    /// Load configuration from file if it exists, otherwise from environment
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            if p.as_ref().exists() {
                return Self::from_file(p);
            }
        }
        Ok(Self::from_env())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
