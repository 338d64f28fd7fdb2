//! Relay engine and task traits
//!
//! A `RelayEngine` turns a `LaunchSpec` into a running `RelayTask` that
//! ingests RTP media on two local ports and forwards it to a remote
//! destination. The gateway only ever talks to these traits; the GStreamer
//! subprocess engine is the production implementation and the mock engine
//! stands in for it in tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::RelayError;
use crate::event::RelayEvent;

/// What a relay task must ingest and where it must publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Local ingest port for Opus-encoded RTP audio
    pub audio_port: u16,

    /// Local ingest port for H.264-encoded RTP video
    pub video_port: u16,

    /// RTMP(S) publishing destination
    pub destination: String,
}

/// Factory for relay tasks
#[async_trait]
pub trait RelayEngine: Send + Sync {
    /// Construct and start a relay task for `spec`
    ///
    /// The returned task is already running. Fails with
    /// [`RelayError::Launch`] when the engine cannot construct or start it.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Arc<dyn RelayTask>, RelayError>;
}

/// A running relay instance
#[async_trait]
pub trait RelayTask: Send + Sync {
    /// Stable identifier for logging
    fn id(&self) -> &str;

    /// Subscribe to the task's asynchronous event stream
    ///
    /// The stream stays open for the task's lifetime and closes when the
    /// task terminates. Terminating a task never delivers an
    /// [`RelayEvent::EndOfStream`] to subscribers; any observed end-of-stream
    /// is therefore unsolicited.
    fn subscribe_events(&self) -> broadcast::Receiver<RelayEvent>;

    /// Tear the task down and release its resources
    ///
    /// Idempotent: terminating an already-stopped task is a no-op. The call
    /// is bounded by the engine's own shutdown grace.
    async fn terminate(&self) -> Result<(), RelayError>;
}
