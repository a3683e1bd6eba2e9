//! Notification types and the artifacts they refer to.

use serde::{Deserialize, Serialize};

/// What a notification announces. Handlers declare which types they support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    ArtifactPinned,
    ArtifactUnpinned,
    ArtifactMarkAsBad,
    ApplicationPaused,
    ApplicationResumed,
    LifecycleEvent,
    ArtifactDeploymentSucceeded,
    ArtifactDeploymentFailed,
    ManualJudgmentAwait,
    ManualJudgmentUpdate,
    TestPassed,
    TestFailed,
    DeliveryConfigChanged,
}

/// Flavour of a notification, used by frequency policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Failure,
    Informational,
}

impl NotificationType {
    pub const ALL: [Self; 13] = [
        Self::ArtifactPinned,
        Self::ArtifactUnpinned,
        Self::ArtifactMarkAsBad,
        Self::ApplicationPaused,
        Self::ApplicationResumed,
        Self::LifecycleEvent,
        Self::ArtifactDeploymentSucceeded,
        Self::ArtifactDeploymentFailed,
        Self::ManualJudgmentAwait,
        Self::ManualJudgmentUpdate,
        Self::TestPassed,
        Self::TestFailed,
        Self::DeliveryConfigChanged,
    ];

    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::ArtifactDeploymentSucceeded | Self::TestPassed => Severity::Success,
            Self::ArtifactDeploymentFailed
            | Self::TestFailed
            | Self::ArtifactMarkAsBad
            | Self::LifecycleEvent => Severity::Failure,
            Self::ArtifactPinned
            | Self::ArtifactUnpinned
            | Self::ApplicationPaused
            | Self::ApplicationResumed
            | Self::ManualJudgmentAwait
            | Self::ManualJudgmentUpdate
            | Self::DeliveryConfigChanged => Severity::Informational,
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ArtifactPinned => "ARTIFACT_PINNED",
            Self::ArtifactUnpinned => "ARTIFACT_UNPINNED",
            Self::ArtifactMarkAsBad => "ARTIFACT_MARK_AS_BAD",
            Self::ApplicationPaused => "APPLICATION_PAUSED",
            Self::ApplicationResumed => "APPLICATION_RESUMED",
            Self::LifecycleEvent => "LIFECYCLE_EVENT",
            Self::ArtifactDeploymentSucceeded => "ARTIFACT_DEPLOYMENT_SUCCEEDED",
            Self::ArtifactDeploymentFailed => "ARTIFACT_DEPLOYMENT_FAILED",
            Self::ManualJudgmentAwait => "MANUAL_JUDGMENT_AWAIT",
            Self::ManualJudgmentUpdate => "MANUAL_JUDGMENT_UPDATE",
            Self::TestPassed => "TEST_PASSED",
            Self::TestFailed => "TEST_FAILED",
            Self::DeliveryConfigChanged => "DELIVERY_CONFIG_CHANGED",
        };
        write!(f, "{s}")
    }
}

/// A specific version of a declared artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub reference: String,
    pub version: String,
}

impl ArtifactVersion {
    pub fn new(reference: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.version)
    }
}

/// Stage of an artifact's life before deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleType {
    Build,
    Bake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Result of a deployment, as reported to source control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Succeeded,
    Failed,
}
