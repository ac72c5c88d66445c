//! Error types for pomod

use thiserror::Error;

/// Core error type for pomod operations
#[derive(Debug, Error)]
pub enum PomoError {
    #[error("No session started")]
    NoActiveSession,

    #[error("A session is already running")]
    SessionAlreadyActive,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl PomoError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Whether this error is a declined precondition rather than a failure
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::NoActiveSession | Self::SessionAlreadyActive)
    }
}

pub type Result<T> = std::result::Result<T, PomoError>;
