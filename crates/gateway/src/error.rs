//! Gateway error types and wire mapping
//!
//! Every failure an entry point can report maps to a stable numeric code and
//! an `{"error_code": <int>, "error": <string>}` payload the signaling host
//! can forward verbatim.

use thiserror::Error;

/// Errors reported by gateway entry points
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request payload is not an object or carries a wrong-typed field
    #[error("{0}")]
    InvalidRequest(String),

    /// Destination is not an RTMP(S) URL
    #[error("Invalid URL format")]
    InvalidDestination,

    /// A mandatory request field is absent
    #[error("Missing mandatory element ({0})")]
    MissingField(&'static str),

    /// The request verb is not part of the protocol
    #[error("Unknown request '{0}'")]
    UnknownRequest(String),

    /// Stop asked of a session that is not forwarding
    #[error("Live streaming hasn't been started")]
    NotActive,

    /// Start asked of a session that is already forwarding
    #[error("Live streaming has already been started")]
    AlreadyActive,

    /// The relay engine could not start a forwarding task
    #[error("Failed to launch relay: {0}")]
    LaunchFailed(String),

    /// No session is registered for the handle
    #[error("No session associated with this handle")]
    NotFound,

    /// A session is already registered for the handle
    #[error("Session already exists for this handle")]
    AlreadyExists,

    /// The gateway has not been initialized
    #[error("Gateway not initialized")]
    NotInitialized,

    /// The gateway is shutting down
    #[error("Shutting down")]
    ShuttingDown,

    /// Anything unexpected
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Stable numeric code for the wire payload
    pub fn code(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) => 411,
            GatewayError::InvalidDestination => 412,
            GatewayError::MissingField(_) => 413,
            GatewayError::UnknownRequest(_) => 414,
            GatewayError::NotActive => 415,
            GatewayError::AlreadyActive => 416,
            GatewayError::LaunchFailed(_) => 417,
            GatewayError::NotFound => 418,
            GatewayError::AlreadyExists => 419,
            GatewayError::NotInitialized => 420,
            GatewayError::ShuttingDown => 421,
            GatewayError::Internal(_) => 499,
        }
    }

    /// Render the error as the wire payload
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error_code": self.code(),
            "error": self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(GatewayError::InvalidRequest("x".to_string()).code(), 411);
        assert_eq!(GatewayError::InvalidDestination.code(), 412);
        assert_eq!(GatewayError::MissingField("url").code(), 413);
        assert_eq!(GatewayError::UnknownRequest("pause".to_string()).code(), 414);
        assert_eq!(GatewayError::NotActive.code(), 415);
        assert_eq!(GatewayError::AlreadyActive.code(), 416);
        assert_eq!(GatewayError::LaunchFailed("x".to_string()).code(), 417);
        assert_eq!(GatewayError::NotFound.code(), 418);
        assert_eq!(GatewayError::AlreadyExists.code(), 419);
        assert_eq!(GatewayError::NotInitialized.code(), 420);
        assert_eq!(GatewayError::ShuttingDown.code(), 421);
        assert_eq!(
            GatewayError::Internal(anyhow::anyhow!("boom")).code(),
            499
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            GatewayError::InvalidDestination.to_string(),
            "Invalid URL format"
        );
        assert_eq!(
            GatewayError::MissingField("request").to_string(),
            "Missing mandatory element (request)"
        );
        assert_eq!(
            GatewayError::UnknownRequest("pause".to_string()).to_string(),
            "Unknown request 'pause'"
        );
        assert_eq!(
            GatewayError::NotActive.to_string(),
            "Live streaming hasn't been started"
        );
        assert_eq!(
            GatewayError::NotFound.to_string(),
            "No session associated with this handle"
        );
    }

    #[test]
    fn test_error_payload_shape() {
        let payload = GatewayError::InvalidDestination.to_payload();
        assert_eq!(payload["error_code"], 412);
        assert_eq!(payload["error"], "Invalid URL format");
        assert_eq!(payload.as_object().unwrap().len(), 2);
    }
}
