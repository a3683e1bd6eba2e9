//! Structural diffing of desired vs current resource state.
//!
//! Both sides are represented as `serde_json::Value`. A [`Diff`] is an
//! ordered map from `/`-separated path to [`DiffEntry`]; an empty diff means
//! the resource has converged.
//!
//! ```
//! use converge_diff::{DiffOptions, diff};
//! use serde_json::json;
//!
//! let current = json!({"id": "sg-1", "capacity": {"max": 3}});
//! let desired = json!({"capacity": {"max": 5}});
//!
//! let d = diff(&current, &desired, &DiffOptions::new().ignore("id")).unwrap_or_default();
//! assert_eq!(d.paths(), vec!["/capacity/max"]);
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod engine;
pub mod error;
pub mod options;
pub mod types;

pub use engine::{diff, diff_against_absent, diff_structs, empty_like};
pub use error::{DiffError, Result, Shape};
pub use options::{ALL_SCALARS, DiffOptions, FieldMutator, lowercase, trimmed};
pub use types::{Diff, DiffEntry, DiffState};
