//! Core error taxonomy for converge operations.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.
//! Callers classify failures through [`Error::kind`] rather than matching
//! payloads, which keeps the check runner's event translation in one place.

use std::path::PathBuf;

use thiserror::Error;

/// The standard Result type for converge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Entity, application or upstream reference not found.
    Lookup,
    /// Actuator or network failure, retried by the scheduler.
    Transport,
    /// Desired state cannot currently be evaluated.
    Unresolvable,
    /// Malformed desired spec, surfaced to the submitter.
    Validation,
    /// Bad engine configuration.
    Config,
}

/// Core error type for converge operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{what} '{name}' not found")]
    Lookup { what: String, name: String },

    #[error("transport failure talking to {target}: {reason}")]
    Transport { target: String, reason: String },

    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("desired state currently unresolvable: {reason}")]
    Unresolvable { reason: String },

    #[error("validation error in {field}: {message}")]
    Validation { field: String, message: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("failed to read config file '{path}': {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    #[error("failed to parse config file '{path}': {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a lookup error.
    pub fn lookup(what: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Lookup {
            what: what.into(),
            name: name.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub const fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create an unresolvable error.
    pub fn unresolvable(reason: impl Into<String>) -> Self {
        Self::Unresolvable {
            reason: reason.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a config read error.
    pub fn config_read(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigRead {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a config parse error.
    pub fn config_parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    ///
    /// Timeouts and I/O failures are transport failures: the scheduler retries
    /// them and they are recorded as check errors.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Lookup { .. } => ErrorKind::Lookup,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Io(_) => ErrorKind::Transport,
            Self::Unresolvable { .. } => ErrorKind::Unresolvable,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Config { .. } | Self::ConfigRead { .. } | Self::ConfigParse { .. } => {
                ErrorKind::Config
            }
        }
    }
}
