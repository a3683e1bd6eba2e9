//! Error types for notification dispatch.

use thiserror::Error;

/// Result type alias for notification operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One message that could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub handler: String,
    pub environment: String,
    pub address: String,
    pub reason: String,
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to '{}' in {}: {}",
            self.handler, self.address, self.environment, self.reason
        )
    }
}

/// Notification error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A handler could not deliver a message.
    #[error("delivery to '{address}' failed: {reason}")]
    Delivery { address: String, reason: String },

    /// One or more messages of a dispatch failed. Every message was attempted.
    #[error("failed to send {} notification(s): {}", .failures.len(), render(.failures))]
    Send { failures: Vec<SendFailure> },

    /// Source control side channel failed.
    #[error("scm {operation} failed: {reason}")]
    Scm { operation: String, reason: String },

    /// Dispatcher was built with missing or invalid parts.
    #[error("invalid dispatcher configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Error from a shared component.
    #[error(transparent)]
    Core(#[from] converge_core::Error),
}

fn render(failures: &[SendFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a delivery error.
    pub fn delivery(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Delivery {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create an SCM error.
    pub fn scm(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Scm {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
