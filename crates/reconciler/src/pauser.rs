//! Pausing and resuming actuation for applications and single entities.

use std::collections::HashSet;
use std::sync::Arc;

use converge_core::EntityKey;
use converge_events::{EventBus, StatusEvent};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::Result;

/// Tracks which applications and entities must not be actuated.
///
/// Pausing or resuming records an event on every affected entity so the
/// decision shows up in its history.
pub struct ActuationPauser {
    bus: Arc<EventBus>,
    applications: RwLock<HashSet<String>>,
    entities: RwLock<HashSet<EntityKey>>,
}

impl ActuationPauser {
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            applications: RwLock::new(HashSet::new()),
            entities: RwLock::new(HashSet::new()),
        }
    }

    /// Whether checks for `key` should be skipped.
    pub async fn is_paused(&self, key: &EntityKey) -> bool {
        self.is_application_paused(&key.application).await
            || self.entities.read().await.contains(key)
    }

    pub async fn is_application_paused(&self, application: &str) -> bool {
        self.applications.read().await.contains(application)
    }

    /// Pause an application. `resources` are the entities it owns.
    ///
    /// Pausing an already paused application records nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if an event cannot be appended.
    pub async fn pause_application(
        &self,
        application: &str,
        resources: &[EntityKey],
        by: Option<&str>,
    ) -> Result<()> {
        if !self.applications.write().await.insert(application.to_string()) {
            return Ok(());
        }
        info!(application, by, "Pausing actuation for application");
        for key in resources.iter().filter(|k| k.application == application) {
            self.bus
                .publish(StatusEvent::actuation_paused(key.clone(), by.map(str::to_string)))
                .await?;
        }
        Ok(())
    }

    /// Resume an application.
    ///
    /// # Errors
    ///
    /// Returns an error if an event cannot be appended.
    pub async fn resume_application(
        &self,
        application: &str,
        resources: &[EntityKey],
        by: Option<&str>,
    ) -> Result<()> {
        if !self.applications.write().await.remove(application) {
            return Ok(());
        }
        info!(application, by, "Resuming actuation for application");
        for key in resources.iter().filter(|k| k.application == application) {
            self.bus
                .publish(StatusEvent::actuation_resumed(key.clone(), by.map(str::to_string)))
                .await?;
        }
        Ok(())
    }

    /// Pause a single entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be appended.
    pub async fn pause_entity(&self, key: &EntityKey, by: Option<&str>) -> Result<()> {
        if self.entities.write().await.insert(key.clone()) {
            info!(entity = %key, by, "Pausing actuation for entity");
            self.bus
                .publish(StatusEvent::actuation_paused(key.clone(), by.map(str::to_string)))
                .await?;
        }
        Ok(())
    }

    /// Resume a single entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be appended.
    pub async fn resume_entity(&self, key: &EntityKey, by: Option<&str>) -> Result<()> {
        if self.entities.write().await.remove(key) {
            info!(entity = %key, by, "Resuming actuation for entity");
            self.bus
                .publish(StatusEvent::actuation_resumed(key.clone(), by.map(str::to_string)))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use converge_events::InMemoryEventLog;

    use super::*;

    fn key(app: &str, name: &str) -> EntityKey {
        EntityKey::new("ec2/cluster@v1", app, name)
    }

    fn setup() -> (ActuationPauser, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new(InMemoryEventLog::new_arc()));
        (ActuationPauser::new(Arc::clone(&bus)), bus)
    }

    /// Given an application with two resources and one foreign resource
    /// When the application is paused
    /// Then only its own resources are paused and get a paused event
    #[tokio::test]
    async fn pausing_application_records_event_per_owned_resource() {
        let (pauser, bus) = setup();
        let resources = [key("fnord", "main"), key("fnord", "canary"), key("orca", "main")];

        pauser
            .pause_application("fnord", &resources, Some("ops@example.com"))
            .await
            .unwrap();

        assert!(pauser.is_paused(&key("fnord", "main")).await);
        assert!(!pauser.is_paused(&key("orca", "main")).await);
        assert_eq!(bus.log().count(&key("fnord", "canary")).await.unwrap(), 1);
        assert_eq!(bus.log().count(&key("orca", "main")).await.unwrap(), 0);
    }

    /// Given a paused application
    /// When it is paused again
    /// Then no duplicate event is recorded
    #[tokio::test]
    async fn pausing_twice_is_idempotent() {
        let (pauser, bus) = setup();
        let resources = [key("fnord", "main")];

        pauser.pause_application("fnord", &resources, None).await.unwrap();
        pauser.pause_application("fnord", &resources, None).await.unwrap();

        assert_eq!(bus.log().count(&key("fnord", "main")).await.unwrap(), 1);
    }

    /// Given a paused entity
    /// When it is resumed
    /// Then it is no longer paused and both events are in its history
    #[tokio::test]
    async fn entity_pause_and_resume() {
        let (pauser, bus) = setup();
        let entity = key("fnord", "main");

        pauser.pause_entity(&entity, None).await.unwrap();
        assert!(pauser.is_paused(&entity).await);

        pauser.resume_entity(&entity, None).await.unwrap();
        assert!(!pauser.is_paused(&entity).await);

        let types: Vec<_> = bus
            .log()
            .history(&entity)
            .await
            .unwrap()
            .iter()
            .map(StatusEvent::event_type)
            .collect();
        assert_eq!(types, vec!["actuation_paused", "actuation_resumed"]);
    }

    #[tokio::test]
    async fn resume_application_clears_pause() {
        let (pauser, _) = setup();
        let resources = [key("fnord", "main")];

        pauser.pause_application("fnord", &resources, None).await.unwrap();
        pauser.resume_application("fnord", &resources, None).await.unwrap();

        assert!(!pauser.is_application_paused("fnord").await);
    }
}
