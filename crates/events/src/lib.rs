//! Event-sourced status for managed entities.
//!
//! This crate provides the append-only record of what the engine observed
//! about each entity, and the status view derived from it:
//!
//! - **Event types**: [`StatusEvent`], one immutable observation per check outcome
//! - **Event log**: per-entity append-only storage with ordered reads
//! - **Event bus**: append, then broadcast to subscribers
//! - **Status**: [`StatusDeriver`] folds history into a [`Status`], with flapping detection
//!
//! # Example
//!
//! ```ignore
//! use converge_core::EntityKey;
//! use converge_events::{EventBus, InMemoryEventLog, StatusDeriver, StatusEvent, StatusService};
//!
//! #[tokio::main]
//! async fn main() -> converge_events::Result<()> {
//!     let log = InMemoryEventLog::new_arc();
//!     let bus = EventBus::new(log.clone());
//!     let status = StatusService::new(log, StatusDeriver::default());
//!
//!     let key = EntityKey::new("ec2/cluster@v1", "fnord", "fnord-main");
//!     bus.publish(StatusEvent::created(key.clone())).await?;
//!     bus.publish(StatusEvent::missing(key.clone())).await?;
//!
//!     println!("{}", status.status(&key).await?); // DIFF
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bus;
pub mod error;
pub mod event;
pub mod projection;
pub mod status;
pub mod store;
pub mod types;

// Re-export main types
pub use bus::{EventBus, EventBusBuilder, EventFilter, EventSubscription};
pub use error::{Error, Result};
pub use event::{StatusEvent, StatusEventKind};
pub use projection::Projection;
pub use status::{
    DEFAULT_FLAPPING_THRESHOLD, Status, StatusDeriver, StatusFold, StatusService,
    actuation_in_progress,
};
pub use store::{EventLog, InMemoryEventLog, TracingEventLog};
pub use types::{EventId, TaskRef};
