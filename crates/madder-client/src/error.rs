//! Error types for the madder client.
//!
//! Application failures (a response with a non-200 status) are not errors at
//! this level: they are routed to the Communicator's error handler. The
//! variants here cover caller mistakes, connection state, and transport
//! faults that break request/response correlation.

use crate::communicator::ConnectionState;
use thiserror::Error;

/// Main error type for the madder client.
#[derive(Debug, Error)]
pub enum ClientError {
    // Caller errors
    #[error("Invalid request for {path:?}: {message}")]
    InvalidRequest { path: String, message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Connection errors
    #[error("Not connected (connection is {0})")]
    NotConnected(ConnectionState),

    // Transport errors
    #[error("Failed to decode response envelope: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Unsolicited message with status {status}: no request is pending")]
    Unsolicited { status: i64 },

    #[error("Protocol violation: {message}")]
    Protocol { message: String },

    #[error("Channel refused message: {message}")]
    Transmit { message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Message size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ClientError {
    /// Create a decode error for an inbound message.
    pub fn decode(err: serde_json::Error) -> Self {
        ClientError::Decode {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a protocol violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        ClientError::Protocol {
            message: message.into(),
        }
    }

    /// Check if this error leaves the connection unusable.
    ///
    /// Fatal errors mean the pending queue can no longer be matched against
    /// the channel; the owning application has to reconnect or terminate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Decode { .. }
                | ClientError::Unsolicited { .. }
                | ClientError::Protocol { .. }
                | ClientError::Transmit { .. }
                | ClientError::Io { .. }
                | ClientError::FrameTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::Unsolicited { status: 200 };
        assert_eq!(
            err.to_string(),
            "Unsolicited message with status 200: no request is pending"
        );

        let err = ClientError::NotConnected(ConnectionState::Closed);
        assert_eq!(err.to_string(), "Not connected (connection is closed)");
    }

    #[test]
    fn test_fatal_errors() {
        assert!(ClientError::protocol("message before open").is_fatal());
        assert!(ClientError::Unsolicited { status: 500 }.is_fatal());
        assert!(!ClientError::NotConnected(ConnectionState::Closed).is_fatal());
        assert!(!ClientError::InvalidRequest {
            path: String::new(),
            message: "empty path".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_from_serde_error_is_caller_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ClientError::from(err);
        assert!(matches!(err, ClientError::Json { .. }));
        assert!(!err.is_fatal());
    }
}
