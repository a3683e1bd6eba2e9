//! Delivery event notifications.
//!
//! Turns delivery events (pins, pauses, deployments, verifications, manual
//! judgments) into messages for the subscriptions of the affected
//! environments:
//!
//! - **Events**: [`NotificationEvent`] names the delivery config and the
//!   environments it concerns
//! - **Frequency**: [`announces`] decides per subscription whether a
//!   notification type is wanted
//! - **Handlers**: [`NotificationHandler`] implementations deliver on one
//!   channel; the first one supporting the type is used
//! - **Dispatcher**: [`NotificationDispatcher`] fans out per environment and
//!   reports preview deployments to source control through [`ScmNotifier`]
//!
//! # Example
//!
//! ```ignore
//! use converge_notifications::{
//!     ArtifactVersion, InMemoryDeliveryConfigRepository, NotificationDispatcher, NotificationEvent,
//! };
//! use std::sync::Arc;
//!
//! let dispatcher = NotificationDispatcher::builder()
//!     .with_repository(Arc::new(InMemoryDeliveryConfigRepository::new([config])))
//!     .with_handler(Arc::new(ChatHandler::new(client)))
//!     .build()?;
//!
//! let report = dispatcher
//!     .dispatch(&NotificationEvent::ArtifactDeployed {
//!         application: "fnord".to_string(),
//!         environment: "prod".to_string(),
//!         artifact: ArtifactVersion::new("fnord-deb", "fnord-1.0.0"),
//!     })
//!     .await?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod frequency;
pub mod handler;
pub mod repository;
pub mod scm;
pub mod types;

pub use dispatcher::{DEPLOY_TASK_PATTERN, DispatchReport, DispatcherBuilder, NotificationDispatcher};
pub use error::{Error, Result, SendFailure};
pub use event::{ConfigRef, MANUAL_JUDGEMENT, Notification, NotificationEvent, Scope};
pub use frequency::announces;
pub use handler::{NotificationHandler, NotificationHandlers};
pub use repository::{DeliveryConfigRepository, InMemoryDeliveryConfigRepository};
pub use scm::{ScmNotifier, deployment_comment};
pub use types::{
    ArtifactVersion, DeploymentStatus, LifecycleStatus, LifecycleType, NotificationType, Severity,
};
