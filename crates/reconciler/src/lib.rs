//! Resource reconciliation: decide, act, record.
//!
//! This crate drives managed entities toward their desired state:
//!
//! - **Processors**: per-kind diff options, preconditions and job planning,
//!   looked up through an immutable [`ProcessorRegistry`]
//! - **Reconciler**: fetches current state through an [`Actuator`], diffs it
//!   against desired state and returns a [`ConvergeOutcome`]. It never
//!   records events itself.
//! - **Check runner**: runs converge with a per-check deadline, executes the
//!   planned requests and appends the matching status events. At most one
//!   check per entity is in flight, nothing is relaunched while earlier tasks
//!   are outstanding, and [`ActuationVeto`]s can block a launch.
//! - **Check loop**: runs the check runner over every entity on an interval
//!   until stopped.
//!
//! # Example
//!
//! ```ignore
//! use converge_core::CheckConfig;
//! use converge_events::{EventBus, InMemoryEventLog};
//! use converge_reconciler::{
//!     ActuationPauser, CheckLoop, CheckRunner, InMemoryEntitySource, LoopConfig,
//!     ProcessorRegistry, ReconcilerBuilder,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> converge_reconciler::Result<()> {
//!     let bus = Arc::new(EventBus::new(InMemoryEventLog::new_arc()));
//!     let reconciler = ReconcilerBuilder::new()
//!         .with_registry(ProcessorRegistry::new(vec![Arc::new(MyProcessor)], &[])?)
//!         .with_actuator(Arc::new(MyActuator))
//!         .build()?;
//!
//!     let config = CheckConfig::default();
//!     let runner = Arc::new(CheckRunner::new(
//!         Arc::new(reconciler),
//!         bus.clone(),
//!         Arc::new(ActuationPauser::new(bus)),
//!         &config,
//!     ));
//!
//!     let source = Arc::new(InMemoryEntitySource::new(Vec::new()));
//!     let mut check_loop = CheckLoop::new(runner, source, LoopConfig::from(&config));
//!     check_loop.run().await
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod actuator;
pub mod error;
pub mod r#loop;
pub mod pauser;
pub mod processor;
pub mod reconciler;
pub mod runner;
pub mod types;
pub mod veto;

// Re-export main types
pub use actuator::{Actuator, ApplicationDirectory, InMemoryApplicationDirectory};
pub use error::{Error, Result};
pub use r#loop::{CheckLoop, EntitySource, InMemoryEntitySource, LoopConfig, LoopStopper};
pub use pauser::ActuationPauser;
pub use processor::{ProcessorRegistry, ResourceProcessor};
pub use reconciler::{Reconciler, ReconcilerBuilder};
pub use runner::{BatchReport, CheckRunner};
pub use types::{
    ChangeKind, ChangeSummary, CheckOutcome, ConvergeOutcome, OrchestrationRequest, SkipReason,
    TaskHandle,
};
pub use veto::{ActuationVeto, VetoEnforcer, VetoResponse};
