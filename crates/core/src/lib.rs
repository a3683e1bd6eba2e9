//! Core types, errors, and configuration for converge.
//!
//! Every other crate in the workspace builds on the identifiers and the
//! delivery-config model defined here:
//!
//! - [`EntityKey`] / [`ManagedEntity`]: what the engine reconciles
//! - [`DeliveryConfig`] / [`Environment`]: how entities and notification
//!   subscriptions are grouped per application
//! - [`Error`] / [`ErrorKind`]: the lookup / transport / unresolvable /
//!   validation taxonomy shared by actuators and processors
//! - [`EngineConfig`]: layered configuration, [`telemetry::init_tracing`]

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::{
    CheckConfig, EngineConfig, LogLevel, LoggingConfig, MAX_CHECK_TIMEOUT_MS, StatusConfig,
};
pub use error::{Error, ErrorKind, Result};
pub use types::{
    DeliveryArtifact, DeliveryConfig, DesiredSpec, EntityKey, Environment, ManagedEntity,
    NotificationChannel, NotificationConfig, NotificationFrequency, ResourceKind,
};
