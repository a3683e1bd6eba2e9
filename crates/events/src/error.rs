//! Error types for the events crate.

use thiserror::Error;

/// Result type alias for event operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Event error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Event log operation failed.
    #[error("event log operation '{operation}' failed: {reason}")]
    StoreFailed { operation: String, reason: String },

    /// No events have been recorded for the entity.
    #[error("no events recorded for '{entity}'")]
    EntityNotFound { entity: String },

    /// Invalid event data.
    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },

    /// Channel closed.
    #[error("event channel closed")]
    ChannelClosed,

    /// Subscriber fell behind and missed events.
    #[error("subscriber lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl Error {
    /// Create a store failed error.
    pub fn store_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an entity not found error.
    pub fn entity_not_found(entity: impl ToString) -> Self {
        Self::EntityNotFound {
            entity: entity.to_string(),
        }
    }

    /// Create an invalid event error.
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            reason: reason.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
