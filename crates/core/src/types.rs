//! Shared identifiers and the delivery-config model.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The kind of a managed entity, e.g. `ec2/cluster@v1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKind(String);

impl ResourceKind {
    /// Create a new kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Get the kind as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable composite key of a managed entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    /// Entity kind.
    pub kind: ResourceKind,
    /// Owning application.
    pub application: String,
    /// Name, unique within kind and application.
    pub name: String,
}

impl EntityKey {
    /// Create a new entity key.
    pub fn new(
        kind: impl Into<String>,
        application: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: ResourceKind::new(kind),
            application: application.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.application, self.name)
    }
}

/// Type-tagged, otherwise opaque desired-state payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredSpec {
    /// Kind tag of the payload.
    pub kind: ResourceKind,
    /// The payload itself.
    pub payload: serde_json::Value,
}

/// An entity whose actual state is driven toward its desired spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedEntity {
    pub key: EntityKey,
    pub spec: DesiredSpec,
}

impl ManagedEntity {
    /// Create a managed entity, checking that the spec tag matches the key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the spec kind differs from the key kind.
    pub fn new(key: EntityKey, payload: serde_json::Value) -> Result<Self> {
        Self::with_spec(
            key.clone(),
            DesiredSpec {
                kind: key.kind,
                payload,
            },
        )
    }

    /// Create a managed entity from an explicit spec.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the spec kind differs from the key kind.
    pub fn with_spec(key: EntityKey, spec: DesiredSpec) -> Result<Self> {
        if key.kind == spec.kind {
            Ok(Self { key, spec })
        } else {
            Err(Error::validation(
                "spec.kind",
                format!("spec kind '{}' does not match entity kind '{}'", spec.kind, key.kind),
            ))
        }
    }

    /// The entity's kind.
    #[must_use]
    pub const fn kind(&self) -> &ResourceKind {
        &self.key.kind
    }

    /// The owning application.
    #[must_use]
    pub fn application(&self) -> &str {
        &self.key.application
    }
}

/// How chatty an environment's notifications are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationFrequency {
    /// Only failures and operator actions.
    Quiet,
    /// Quiet plus successes.
    #[default]
    Normal,
    /// Everything.
    Verbose,
}

/// Delivery channel a notification config targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Chat,
    Email,
}

/// One notification subscription of an environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    pub address: String,
    #[serde(default)]
    pub frequency: NotificationFrequency,
}

impl NotificationConfig {
    /// Create a chat notification config.
    pub fn chat(address: impl Into<String>, frequency: NotificationFrequency) -> Self {
        Self {
            channel: NotificationChannel::Chat,
            address: address.into(),
            frequency,
        }
    }

    /// Create an email notification config.
    pub fn email(address: impl Into<String>, frequency: NotificationFrequency) -> Self {
        Self {
            channel: NotificationChannel::Email,
            address: address.into(),
            frequency,
        }
    }
}

/// An artifact declared by a delivery config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryArtifact {
    /// Reference used by environments and resources.
    pub reference: String,
    pub name: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
}

/// A named grouping of resources inside a delivery config.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    /// Ephemeral, per-change-request environment.
    #[serde(default)]
    pub is_preview: bool,
    #[serde(default)]
    pub resources: BTreeSet<EntityKey>,
    /// References of the artifacts deployed into this environment.
    #[serde(default)]
    pub artifacts: BTreeSet<String>,
    #[serde(default)]
    pub notifications: Vec<NotificationConfig>,
    /// Free-form metadata such as `branch` or `pullRequestId`.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a resource.
    #[must_use]
    pub fn with_resource(mut self, key: EntityKey) -> Self {
        self.resources.insert(key);
        self
    }

    /// Declare an artifact as used by this environment.
    #[must_use]
    pub fn with_artifact(mut self, reference: impl Into<String>) -> Self {
        self.artifacts.insert(reference.into());
        self
    }

    /// Add a notification config.
    #[must_use]
    pub fn with_notification(mut self, config: NotificationConfig) -> Self {
        self.notifications.push(config);
        self
    }

    /// Mark this environment as a preview environment.
    #[must_use]
    pub fn preview(mut self, metadata: impl IntoIterator<Item = (String, String)>) -> Self {
        self.is_preview = true;
        self.metadata.extend(metadata);
        self
    }

    /// Whether the environment contains the given resource.
    #[must_use]
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.resources.contains(key)
    }

    /// Whether the environment deploys the given artifact reference.
    #[must_use]
    pub fn uses_artifact(&self, reference: &str) -> bool {
        self.artifacts.contains(reference)
    }
}

/// Environments and artifacts of one application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub name: String,
    pub application: String,
    #[serde(default)]
    pub artifacts: Vec<DeliveryArtifact>,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

impl DeliveryConfig {
    /// Look up an environment by name.
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|env| env.name == name)
    }

    /// The environment containing a resource.
    #[must_use]
    pub fn environment_for(&self, key: &EntityKey) -> Option<&Environment> {
        self.environments.iter().find(|env| env.contains(key))
    }

    /// Environments deploying an artifact.
    pub fn environments_using<'a>(
        &'a self,
        reference: &'a str,
    ) -> impl Iterator<Item = &'a Environment> + 'a {
        self.environments
            .iter()
            .filter(move |env| env.uses_artifact(reference))
    }

    /// Look up a declared artifact by reference.
    #[must_use]
    pub fn artifact(&self, reference: &str) -> Option<&DeliveryArtifact> {
        self.artifacts.iter().find(|a| a.reference == reference)
    }
}
