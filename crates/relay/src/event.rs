//! Event model for running relay tasks
//!
//! While a relay task runs it emits a stream of events describing what the
//! underlying media engine is doing. The gateway's supervisor listens to this
//! stream and logs each event; `Error` and unsolicited `EndOfStream` mark the
//! relay as degraded without tearing the session down.

/// An asynchronous event emitted by a running relay task
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// The engine reported a fatal or element-level error
    Error {
        /// Human-readable error message
        message: String,
    },

    /// The media stream ended
    EndOfStream,

    /// The relay transitioned between engine states
    StateChanged {
        /// State before the transition
        old: RelayState,
        /// State after the transition
        new: RelayState,
    },

    /// Any other engine message, identified by its kind
    Other {
        /// Engine-specific message kind (e.g. `stream-status`, `latency`)
        kind: String,
    },
}

/// Engine states a relay task moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Task exists but holds no resources
    Null,

    /// Resources allocated, not processing
    Ready,

    /// Prerolled, clock stopped
    Paused,

    /// Actively forwarding media
    Playing,
}

impl RelayState {
    /// Parse an engine state name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NULL" => Some(RelayState::Null),
            "READY" => Some(RelayState::Ready),
            "PAUSED" => Some(RelayState::Paused),
            "PLAYING" => Some(RelayState::Playing),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayState::Null => write!(f, "null"),
            RelayState::Ready => write!(f, "ready"),
            RelayState::Paused => write!(f, "paused"),
            RelayState::Playing => write!(f, "playing"),
        }
    }
}
