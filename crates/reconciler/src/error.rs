//! Error types for the reconciler crate.
//!
//! These are caller errors. Actuator and precondition failures are not
//! errors here: they become a [`ConvergeOutcome`](crate::ConvergeOutcome)
//! variant so one entity's failure never aborts a batch.

use converge_core::ResourceKind;
use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
#[derive(Debug, Error)]
pub enum Error {
    /// No registered processor supports the kind.
    #[error("no processor supports kind '{kind}'")]
    NoProcessor { kind: ResourceKind },

    /// Two processors claim the same kind.
    #[error("kind '{kind}' is supported by both '{first}' and '{second}'")]
    DuplicateProcessor {
        kind: ResourceKind,
        first: String,
        second: String,
    },

    /// Malformed desired spec, or another error surfaced to the submitter.
    #[error(transparent)]
    Core(#[from] converge_core::Error),

    /// Desired and current state could not be compared.
    #[error("diff failed: {0}")]
    Diff(#[from] converge_diff::DiffError),

    /// Event log or bus error.
    #[error("event error: {0}")]
    Events(#[from] converge_events::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The check loop gave up.
    #[error("check loop failed: {reason}")]
    LoopFailed { reason: String },
}

impl Error {
    /// Create a no processor error.
    pub fn no_processor(kind: &ResourceKind) -> Self {
        Self::NoProcessor { kind: kind.clone() }
    }

    /// Create a duplicate processor error.
    pub fn duplicate_processor(
        kind: &ResourceKind,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::DuplicateProcessor {
            kind: kind.clone(),
            first: first.into(),
            second: second.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a loop failed error.
    pub fn loop_failed(reason: impl Into<String>) -> Self {
        Self::LoopFailed {
            reason: reason.into(),
        }
    }

    /// Whether this is a validation error, to be reported to whoever
    /// submitted the desired state.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Core(e) if e.kind() == converge_core::ErrorKind::Validation)
    }
}
