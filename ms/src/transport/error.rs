//! Transport error types

use std::time::Duration;
use thiserror::Error;

use crate::codec::MessageError;
use crate::reconciliation::ReconciliationError;

/// Errors surfaced by the transport substrate and request handlers
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no handler registered for endpoint [{0}]")]
    UnknownEndpoint(String),

    #[error("handler already registered for endpoint [{0}]")]
    DuplicateEndpoint(String),

    #[error("node [{0}] is not connected")]
    NodeNotConnected(String),

    #[error("failed to decode request: {0}")]
    Decode(#[from] MessageError),

    #[error("request failed: {0}")]
    Reconciliation(#[from] ReconciliationError),

    #[error("remote failure from [{node}]: {message}")]
    Remote { node: String, message: String },

    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("no async runtime available to send on")]
    NoRuntime,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True when the remote side received the request and rejected it
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            TransportError::Remote { .. }
                | TransportError::Decode(_)
                | TransportError::Reconciliation(_)
                | TransportError::UnknownEndpoint(_)
        )
    }
}
