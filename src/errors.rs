// Copyright 2025 Cowboy AI, LLC.

//! Error types for participant operations

use thiserror::Error;

/// Errors that can occur while reconciling participant state
#[derive(Debug, Clone, Error)]
pub enum ParticipantError {
    /// Entity not found in the state store
    #[error("Not found: {entity} with id {id}")]
    NotFound {
        /// Kind of entity that wasn't found
        entity: String,
        /// ID that was searched for
        id: String,
    },

    /// Inbound message is structurally unusable
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// A callback reported an element state that cannot be applied
    #[error("Invalid state report: {0}")]
    InvalidStateReport(String),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Outbound publisher rejected a message
    #[error("Publish error: {0}")]
    Publish(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The executor no longer accepts work
    #[error("Executor closed")]
    ExecutorClosed,
}

/// Result type for participant operations
pub type ParticipantResult<T> = Result<T, ParticipantError>;

impl From<serde_json::Error> for ParticipantError {
    fn from(err: serde_json::Error) -> Self {
        ParticipantError::Serialization(err.to_string())
    }
}

impl ParticipantError {
    /// Create a not-found error for an entity kind and id
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        ParticipantError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, ParticipantError::NotFound { .. })
    }

    /// Check if this error was caused by a malformed message or report
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ParticipantError::InvalidMessage(_) | ParticipantError::InvalidStateReport(_)
        )
    }
}
