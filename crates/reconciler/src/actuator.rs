//! Seams to the outside world: the actuator and the application directory.

use std::collections::HashSet;

use async_trait::async_trait;
use converge_core::{DesiredSpec, Result};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::types::{OrchestrationRequest, TaskHandle};

/// Reads and drives the underlying resource.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Name recorded on `ActuationLaunched` events.
    fn name(&self) -> &str;

    /// Read the resource's current state. `Ok(None)` means it does not exist.
    ///
    /// # Errors
    ///
    /// Transport or lookup failures; `Error::Unresolvable` when the spec
    /// references something that cannot currently be resolved.
    async fn get_current(&self, spec: &DesiredSpec) -> Result<Option<Value>>;

    /// Submit an orchestration job.
    ///
    /// # Errors
    ///
    /// Transport failures from the orchestration API.
    async fn execute(&self, request: &OrchestrationRequest) -> Result<TaskHandle>;
}

/// Resolves whether an owning application exists.
#[async_trait]
pub trait ApplicationDirectory: Send + Sync {
    /// # Errors
    ///
    /// Transport failures talking to the metadata source.
    async fn application_exists(&self, application: &str) -> Result<bool>;
}

/// Application directory backed by a set of names.
#[derive(Debug, Default)]
pub struct InMemoryApplicationDirectory {
    applications: RwLock<HashSet<String>>,
}

impl InMemoryApplicationDirectory {
    pub fn new<I, S>(applications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            applications: RwLock::new(applications.into_iter().map(Into::into).collect()),
        }
    }

    pub async fn register(&self, application: impl Into<String>) {
        self.applications.write().await.insert(application.into());
    }

    pub async fn remove(&self, application: &str) {
        self.applications.write().await.remove(application);
    }
}

#[async_trait]
impl ApplicationDirectory for InMemoryApplicationDirectory {
    async fn application_exists(&self, application: &str) -> Result<bool> {
        Ok(self.applications.read().await.contains(application))
    }
}
