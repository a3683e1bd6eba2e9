//! Constraint state change routing.
//!
//! Environments gate promotion on constraints. When a constraint's state
//! changes, the [`ConstraintRelay`] hands the event to the evaluators that
//! own that constraint type and to no others.
//!
//! # Example
//!
//! ```ignore
//! use converge_constraints::{
//!     Constraint, ConstraintRelay, ConstraintState, ConstraintStateChanged, ConstraintStatus,
//! };
//! use std::sync::Arc;
//!
//! let relay = ConstraintRelay::new(vec![Arc::new(ManualJudgementEvaluator::default())]);
//! let event = ConstraintStateChanged::new(
//!     "prod",
//!     Constraint::new("manual-judgement"),
//!     None,
//!     ConstraintState::new("manual-judgement", "fnord-1.0.0", ConstraintStatus::Pending),
//! )?;
//! let report = relay.on_constraint_state_changed(&event).await;
//! assert!(report.is_success());
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod relay;
pub mod types;

pub use error::{Error, Result};
pub use relay::{ConstraintRelay, RelayReport, StatefulConstraintEvaluator};
pub use types::{Constraint, ConstraintState, ConstraintStateChanged, ConstraintStatus};
