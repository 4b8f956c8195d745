//! Error types for session handling and intent routing.

use robobrain_core::error::BrainError;

/// Errors from the session store and intent router.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("confidence must be between 0 and 1, got {0}")]
    InvalidConfidence(f64),
    #[error("invalid router configuration: {0}")]
    InvalidConfig(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Stable snake_case name of the failure kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::EmptyMessage
            | ChatError::MessageTooLong(_)
            | ChatError::InvalidConfidence(_) => "validation",
            ChatError::InvalidConfig(_) => "config",
            ChatError::SessionNotFound(_) => "not_found",
            ChatError::Storage(_) => "storage",
        }
    }
}

impl From<ChatError> for BrainError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::SessionNotFound(id) => BrainError::NotFound(format!("session {}", id)),
            ChatError::InvalidConfig(msg) => BrainError::Config(msg),
            ChatError::Storage(msg) => BrainError::Api(msg),
            other => BrainError::Validation(other.to_string()),
        }
    }
}
