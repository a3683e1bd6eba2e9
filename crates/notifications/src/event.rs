//! Domain events that may be announced, and the messages built from them.

use chrono::{DateTime, Utc};
use converge_constraints::{ConstraintStateChanged, ConstraintStatus};
use converge_core::EntityKey;
use serde::{Deserialize, Serialize};

use crate::types::{ArtifactVersion, LifecycleStatus, LifecycleType, NotificationType};

/// Constraint type whose state changes are announced as manual judgments.
pub const MANUAL_JUDGEMENT: &str = "manual-judgement";

/// A delivery event subscribers may want to hear about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    Pinned {
        application: String,
        environment: String,
        artifact: ArtifactVersion,
        pinned_by: Option<String>,
        comment: Option<String>,
    },
    Unpinned {
        application: String,
        environment: String,
        artifact: ArtifactVersion,
        unpinned_by: Option<String>,
    },
    MarkedAsBad {
        application: String,
        environment: String,
        artifact: ArtifactVersion,
        marked_by: Option<String>,
        comment: Option<String>,
    },
    ApplicationPaused {
        application: String,
        paused_by: Option<String>,
        comment: Option<String>,
    },
    ApplicationResumed {
        application: String,
        resumed_by: Option<String>,
    },
    Lifecycle {
        delivery_config: String,
        artifact: ArtifactVersion,
        lifecycle_type: LifecycleType,
        status: LifecycleStatus,
    },
    ArtifactDeployed {
        application: String,
        environment: String,
        artifact: ArtifactVersion,
    },
    /// A deploy task failed. The version is parsed from the first task name.
    ArtifactDeployFailed {
        application: String,
        resource: EntityKey,
        reference: String,
        task_names: Vec<String>,
    },
    ArtifactVersionVetoed {
        application: String,
        environment: String,
        artifact: ArtifactVersion,
    },
    VerificationCompleted {
        delivery_config: String,
        environment: String,
        artifact: ArtifactVersion,
        status: ConstraintStatus,
    },
    ManualJudgmentAwaiting {
        application: String,
        environment: String,
        artifact: ArtifactVersion,
    },
    ManualJudgmentUpdated {
        application: String,
        environment: String,
        artifact: ArtifactVersion,
        status: ConstraintStatus,
        judged_by: Option<String>,
    },
    DeliveryConfigChanged {
        application: String,
        new: bool,
    },
}

/// How to find the delivery config that owns an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRef<'a> {
    Application(&'a str),
    Name(&'a str),
}

/// Which environments of the delivery config hear about an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Environment(&'a str),
    /// The environment containing this resource.
    Resource(&'a EntityKey),
    /// Every environment deploying this artifact.
    Artifact(&'a str),
    All,
}

impl NotificationEvent {
    /// Build a manual judgment event from a constraint state change.
    ///
    /// Only a first evaluation to `PENDING` and a judgment on a pending
    /// constraint are announced.
    #[must_use]
    pub fn from_constraint_change(
        application: &str,
        reference: &str,
        change: &ConstraintStateChanged,
    ) -> Option<Self> {
        if change.constraint_type() != MANUAL_JUDGEMENT {
            return None;
        }
        let current = change.current_state();
        let artifact = ArtifactVersion::new(reference, current.artifact_version.clone());
        let previous = change.previous_state().map(|s| s.status);

        match (previous, current.status) {
            (None, ConstraintStatus::Pending) => Some(Self::ManualJudgmentAwaiting {
                application: application.to_string(),
                environment: change.environment().to_string(),
                artifact,
            }),
            (Some(ConstraintStatus::Pending), status) if status.passes() || status.fails() => {
                Some(Self::ManualJudgmentUpdated {
                    application: application.to_string(),
                    environment: change.environment().to_string(),
                    artifact,
                    status,
                    judged_by: current.judged_by.clone(),
                })
            }
            _ => None,
        }
    }

    /// The notification type, or `None` if this event is never announced.
    #[must_use]
    pub fn notification_type(&self) -> Option<NotificationType> {
        match self {
            Self::Pinned { .. } => Some(NotificationType::ArtifactPinned),
            Self::Unpinned { .. } => Some(NotificationType::ArtifactUnpinned),
            Self::MarkedAsBad { .. } => Some(NotificationType::ArtifactMarkAsBad),
            Self::ApplicationPaused { .. } => Some(NotificationType::ApplicationPaused),
            Self::ApplicationResumed { .. } => Some(NotificationType::ApplicationResumed),
            Self::Lifecycle {
                lifecycle_type: LifecycleType::Bake,
                status: LifecycleStatus::Failed,
                ..
            } => Some(NotificationType::LifecycleEvent),
            Self::Lifecycle { .. } => None,
            Self::ArtifactDeployed { .. } => Some(NotificationType::ArtifactDeploymentSucceeded),
            Self::ArtifactDeployFailed { .. } | Self::ArtifactVersionVetoed { .. } => {
                Some(NotificationType::ArtifactDeploymentFailed)
            }
            Self::VerificationCompleted { status, .. } => match status {
                ConstraintStatus::Pass => Some(NotificationType::TestPassed),
                ConstraintStatus::Fail => Some(NotificationType::TestFailed),
                _ => None,
            },
            Self::ManualJudgmentAwaiting { .. } => Some(NotificationType::ManualJudgmentAwait),
            Self::ManualJudgmentUpdated { .. } => Some(NotificationType::ManualJudgmentUpdate),
            Self::DeliveryConfigChanged { .. } => Some(NotificationType::DeliveryConfigChanged),
        }
    }

    #[must_use]
    pub fn config_ref(&self) -> ConfigRef<'_> {
        match self {
            Self::Lifecycle {
                delivery_config, ..
            }
            | Self::VerificationCompleted {
                delivery_config, ..
            } => ConfigRef::Name(delivery_config),
            Self::Pinned { application, .. }
            | Self::Unpinned { application, .. }
            | Self::MarkedAsBad { application, .. }
            | Self::ApplicationPaused { application, .. }
            | Self::ApplicationResumed { application, .. }
            | Self::ArtifactDeployed { application, .. }
            | Self::ArtifactDeployFailed { application, .. }
            | Self::ArtifactVersionVetoed { application, .. }
            | Self::ManualJudgmentAwaiting { application, .. }
            | Self::ManualJudgmentUpdated { application, .. }
            | Self::DeliveryConfigChanged { application, .. } => ConfigRef::Application(application),
        }
    }

    #[must_use]
    pub fn scope(&self) -> Scope<'_> {
        match self {
            Self::Pinned { environment, .. }
            | Self::Unpinned { environment, .. }
            | Self::MarkedAsBad { environment, .. }
            | Self::ArtifactDeployed { environment, .. }
            | Self::ArtifactVersionVetoed { environment, .. }
            | Self::VerificationCompleted { environment, .. }
            | Self::ManualJudgmentAwaiting { environment, .. }
            | Self::ManualJudgmentUpdated { environment, .. } => Scope::Environment(environment),
            Self::ArtifactDeployFailed { resource, .. } => Scope::Resource(resource),
            Self::Lifecycle { artifact, .. } => Scope::Artifact(&artifact.reference),
            Self::ApplicationPaused { .. }
            | Self::ApplicationResumed { .. }
            | Self::DeliveryConfigChanged { .. } => Scope::All,
        }
    }

    /// The artifact reference the event concerns, if any.
    #[must_use]
    pub fn artifact_reference(&self) -> Option<&str> {
        match self {
            Self::ArtifactDeployFailed { reference, .. } => Some(reference.as_str()),
            _ => self.artifact().map(|a| a.reference.as_str()),
        }
    }

    /// The artifact version carried by the event, if any.
    #[must_use]
    pub fn artifact(&self) -> Option<&ArtifactVersion> {
        match self {
            Self::Pinned { artifact, .. }
            | Self::Unpinned { artifact, .. }
            | Self::MarkedAsBad { artifact, .. }
            | Self::Lifecycle { artifact, .. }
            | Self::ArtifactDeployed { artifact, .. }
            | Self::ArtifactVersionVetoed { artifact, .. }
            | Self::VerificationCompleted { artifact, .. }
            | Self::ManualJudgmentAwaiting { artifact, .. }
            | Self::ManualJudgmentUpdated { artifact, .. } => Some(artifact),
            Self::ArtifactDeployFailed { .. }
            | Self::ApplicationPaused { .. }
            | Self::ApplicationResumed { .. }
            | Self::DeliveryConfigChanged { .. } => None,
        }
    }
}

/// A message ready for a handler, addressed to one environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub notification_type: NotificationType,
    pub application: String,
    pub environment: String,
    pub artifact: Option<ArtifactVersion>,
    pub event: NotificationEvent,
    pub time: DateTime<Utc>,
}

impl Notification {
    /// One-line summary suitable for a chat message or email subject.
    #[must_use]
    pub fn headline(&self) -> String {
        let app = &self.application;
        let env = &self.environment;
        let version = self
            .artifact
            .as_ref()
            .map_or_else(|| "unknown version".to_string(), |a| a.version.clone());

        match self.notification_type {
            NotificationType::ArtifactPinned => format!("{app}: {version} pinned in {env}"),
            NotificationType::ArtifactUnpinned => format!("{app}: {version} unpinned in {env}"),
            NotificationType::ArtifactMarkAsBad => {
                format!("{app}: {version} marked as bad in {env}")
            }
            NotificationType::ApplicationPaused => format!("{app}: management paused"),
            NotificationType::ApplicationResumed => format!("{app}: management resumed"),
            NotificationType::LifecycleEvent => format!("{app}: bake of {version} failed"),
            NotificationType::ArtifactDeploymentSucceeded => {
                format!("{app}: {version} deployed to {env}")
            }
            NotificationType::ArtifactDeploymentFailed => {
                format!("{app}: {version} failed to deploy to {env}")
            }
            NotificationType::ManualJudgmentAwait => {
                format!("{app}: {version} awaiting manual judgment in {env}")
            }
            NotificationType::ManualJudgmentUpdate => {
                format!("{app}: manual judgment of {version} in {env} completed")
            }
            NotificationType::TestPassed => format!("{app}: verification of {version} passed in {env}"),
            NotificationType::TestFailed => format!("{app}: verification of {version} failed in {env}"),
            NotificationType::DeliveryConfigChanged => format!("{app}: delivery config updated"),
        }
    }
}
