//! Diff errors.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Result alias for diff operations.
pub type Result<T> = std::result::Result<T, DiffError>;

/// Coarse shape of a JSON value, used to reject incomparable roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    List,
    Scalar,
}

impl Shape {
    /// Shape of `value`. `null` counts as a scalar.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::List,
            _ => Self::Scalar,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::List => write!(f, "list"),
            Self::Scalar => write!(f, "scalar"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("cannot diff a {current} against a {desired}")]
    TypeMismatch { current: Shape, desired: Shape },

    #[error("serialization failed: {reason}")]
    Serialization { reason: String },
}

impl DiffError {
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }
}
