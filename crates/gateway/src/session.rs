//! Session state for signaling handles
//!
//! One `Session` tracks the forwarding state of one WebRTC connection
//! handle, from creation to destruction. A session is idle until a start
//! request launches a relay, and active while that relay forwards media to
//! its RTMP destination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use streamcast_relay::RelayTask;

use crate::ports::PortPair;

/// Identity of a signaling connection handle
///
/// Opaque to the gateway: the signaling host owns the handle's lifetime and
/// sessions are only keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HandleId(String);

impl HandleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HandleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for HandleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Health of an active relay as observed from its event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayHealth {
    /// Forwarding normally
    Running,

    /// The relay reported an error or its stream ended on its own
    Degraded {
        /// First observed reason
        reason: String,
    },
}

/// Everything an active forwarding session owns
pub struct ActiveRelay {
    /// Ingest ports the relay listens on
    pub ports: PortPair,

    /// RTMP(S) destination the relay publishes to
    pub destination: String,

    /// When forwarding started
    pub started_at: DateTime<Utc>,

    /// The running relay task, owned exclusively by this slot
    pub task: Arc<dyn RelayTask>,

    /// Health as maintained by the event listener
    pub health: Arc<parking_lot::RwLock<RelayHealth>>,

    /// Event-listener task consuming the relay's stream
    pub listener: JoinHandle<()>,
}

impl std::fmt::Debug for ActiveRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRelay")
            .field("ports", &self.ports)
            .field("destination", &self.destination)
            .field("started_at", &self.started_at)
            .field("task_id", &self.task.id())
            .finish_non_exhaustive()
    }
}

/// One connection handle's forwarding state
#[derive(Debug)]
pub struct Session {
    /// Identity of the owning handle
    pub handle_id: HandleId,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Forwarding slot: `None` while idle, `Some` while a relay runs
    ///
    /// Start and stop hold this mutex across the whole operation, so
    /// per-session transitions serialize and the relay handle can only be
    /// taken out once.
    forwarding: Mutex<Option<ActiveRelay>>,

    /// Set once the session has left the store for good
    ///
    /// Written and read only while the forwarding guard is held, so a start
    /// that loses the guard race to a destroy observes it reliably.
    retired: AtomicBool,
}

impl Session {
    /// Create a fresh idle session
    pub fn new(handle_id: HandleId) -> Self {
        Self {
            handle_id,
            created_at: Utc::now(),
            forwarding: Mutex::new(None),
            retired: AtomicBool::new(false),
        }
    }

    /// Lock the forwarding slot
    pub async fn forwarding(&self) -> MutexGuard<'_, Option<ActiveRelay>> {
        self.forwarding.lock().await
    }

    /// Mark the session as gone from the store
    ///
    /// Must be called with the forwarding guard held. A start still in
    /// flight with a stale reference checks this before committing a relay
    /// that nothing could ever reach to stop.
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    /// Whether the session has left the store for good
    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    /// Whether a relay is currently running for this session
    pub async fn is_active(&self) -> bool {
        self.forwarding.lock().await.is_some()
    }

    /// Read-only snapshot for query responses
    pub async fn summary(&self) -> SessionSummary {
        let slot = self.forwarding.lock().await;
        match slot.as_ref() {
            Some(active) => {
                let degraded = match &*active.health.read() {
                    RelayHealth::Running => None,
                    RelayHealth::Degraded { reason } => Some(reason.clone()),
                };
                SessionSummary {
                    handle_id: self.handle_id.clone(),
                    created_at: self.created_at,
                    active: true,
                    audio_port: Some(active.ports.audio),
                    video_port: Some(active.ports.video),
                    destination: Some(active.destination.clone()),
                    started_at: Some(active.started_at),
                    degraded,
                }
            }
            None => SessionSummary {
                handle_id: self.handle_id.clone(),
                created_at: self.created_at,
                active: false,
                audio_port: None,
                video_port: None,
                destination: None,
                started_at: None,
                degraded: None,
            },
        }
    }
}

/// Read-only snapshot of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Identity of the owning handle
    pub handle_id: HandleId,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Whether a relay is currently running
    pub active: bool,

    /// Ingest port receiving audio, when active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_port: Option<u16>,

    /// Ingest port receiving video, when active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_port: Option<u16>,

    /// Publishing destination, when active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// When forwarding started, when active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Why the relay is degraded, if it is
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}
