//! Error types for the relay engine boundary

use thiserror::Error;

/// Errors reported by relay engines and tasks
#[derive(Debug, Error)]
pub enum RelayError {
    /// The engine could not construct or start a relay task
    #[error("Failed to launch relay: {0}")]
    Launch(String),

    /// The task could not be brought down cleanly
    #[error("Failed to terminate relay: {0}")]
    Terminate(String),
}
