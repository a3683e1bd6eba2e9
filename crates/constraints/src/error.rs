//! Error types for constraint evaluation.

use thiserror::Error;

/// Result type alias for constraint operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Constraint error types.
#[derive(Debug, Error)]
pub enum Error {
    /// An evaluator could not process a state change.
    #[error("evaluator '{evaluator}' failed: {reason}")]
    Evaluation { evaluator: String, reason: String },

    /// The event does not describe a valid state change.
    #[error("invalid constraint event: {reason}")]
    InvalidEvent { reason: String },

    /// Error from a shared component.
    #[error(transparent)]
    Core(#[from] converge_core::Error),
}

impl Error {
    /// Create an evaluation error.
    pub fn evaluation(evaluator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Evaluation {
            evaluator: evaluator.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid event error.
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            reason: reason.into(),
        }
    }
}
