//! Error types and their classification.
//!
//! | kind               | effect                                    |
//! |--------------------|-------------------------------------------|
//! | `DecodeError`      | logged, nacked, session continues         |
//! | `HandlerError`     | logged, nacked, session continues         |
//! | `Expired`          | counted, slot released                    |
//! | `TransportFailure` | fatal to the session, returned to caller  |
//! | `Cancelled`        | expected shutdown, not an error           |

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operational classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DecodeError,
    HandlerError,
    Expired,
    TransportFailure,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::HandlerError => "HandlerError",
            ErrorKind::Expired => "Expired",
            ErrorKind::TransportFailure => "TransportFailure",
            ErrorKind::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload could not be turned into a `Message`.
#[derive(Debug, Error)]
#[error("malformed payload (ack_id={ack_id}): {source}")]
pub struct DecodeError {
    pub ack_id: String,
    #[source]
    pub source: serde_json::Error,
}

/// Failure reported by (or on behalf of) a message handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("forwarding to {bucket}/{object} failed: {source}")]
    Forward {
        bucket: String,
        object: String,
        #[source]
        source: StoreError,
    },

    #[error("handler panicked")]
    Panicked,

    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    pub fn other(message: impl Into<String>) -> Self {
        HandlerError::Other(message.into())
    }
}

/// Refused terminal transition on an ack handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AckError {
    #[error("ack deadline elapsed")]
    Expired,

    #[error("handle already settled")]
    AlreadyTerminal,
}

/// Failure talking to the message source.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("settle failed: {0}")]
    Settle(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure writing to a content store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object name: {0:?}")]
    InvalidObjectName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A blocked wait was interrupted by session cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cancelled")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_error_names_destination() {
        let err = HandlerError::Forward {
            bucket: "b".into(),
            object: "o.txt".into(),
            source: StoreError::InvalidObjectName("../x".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("b/o.txt"));
    }

    #[test]
    fn kinds_have_stable_names() {
        assert_eq!(ErrorKind::TransportFailure.to_string(), "TransportFailure");
        assert_eq!(ErrorKind::DecodeError.as_str(), "DecodeError");
    }
}
