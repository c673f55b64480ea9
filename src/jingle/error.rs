//! Session-level error types.

use jcore::types::session::SessionId;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(SessionId),

    #[error("session already exists: {0}")]
    AlreadyExists(SessionId),

    #[error("invalid session state transition: {0}")]
    InvalidTransition(#[from] super::session::InvalidTransition),
}

/// Failure reported by the transport engine.
#[derive(Debug, Clone, Error)]
#[error("transport engine error: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
