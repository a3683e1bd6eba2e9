//! Event log trait and implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use converge_core::EntityKey;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::event::StatusEvent;
use crate::types::EventId;

/// Append-only, per-entity storage of status events.
///
/// Read order is append order. Events are never mutated or removed.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append an event to its entity's history.
    async fn append(&self, event: StatusEvent) -> Result<EventId>;

    /// Read the full history of one entity, oldest first.
    async fn history(&self, entity: &EntityKey) -> Result<Vec<StatusEvent>>;

    /// Get the most recent event for an entity.
    async fn last_event(&self, entity: &EntityKey) -> Result<Option<StatusEvent>>;

    /// Get the number of events recorded for an entity.
    async fn count(&self, entity: &EntityKey) -> Result<usize>;
}

type EntityHistory = Arc<RwLock<Vec<StatusEvent>>>;

/// In-memory event log.
///
/// Each entity's history sits behind its own lock, so appends to different
/// entities never contend and a reader always sees a whole prefix.
#[derive(Default)]
pub struct InMemoryEventLog {
    histories: RwLock<HashMap<EntityKey, EntityHistory>>,
}

impl InMemoryEventLog {
    /// Create a new in-memory event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory event log wrapped in an Arc.
    #[must_use]
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    async fn existing(&self, entity: &EntityKey) -> Option<EntityHistory> {
        self.histories.read().await.get(entity).cloned()
    }

    async fn history_for_append(&self, entity: &EntityKey) -> EntityHistory {
        if let Some(history) = self.existing(entity).await {
            return history;
        }
        let mut histories = self.histories.write().await;
        Arc::clone(histories.entry(entity.clone()).or_default())
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: StatusEvent) -> Result<EventId> {
        let event_id = event.event_id;
        let history = self.history_for_append(&event.entity).await;
        history.write().await.push(event);
        Ok(event_id)
    }

    async fn history(&self, entity: &EntityKey) -> Result<Vec<StatusEvent>> {
        match self.existing(entity).await {
            Some(history) => Ok(history.read().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn last_event(&self, entity: &EntityKey) -> Result<Option<StatusEvent>> {
        match self.existing(entity).await {
            Some(history) => Ok(history.read().await.last().cloned()),
            None => Ok(None),
        }
    }

    async fn count(&self, entity: &EntityKey) -> Result<usize> {
        match self.existing(entity).await {
            Some(history) => Ok(history.read().await.len()),
            None => Ok(0),
        }
    }
}

/// A wrapper that adds tracing to an event log.
pub struct TracingEventLog<S: EventLog> {
    inner: S,
}

impl<S: EventLog> TracingEventLog<S> {
    /// Create a new tracing event log.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: EventLog> EventLog for TracingEventLog<S> {
    async fn append(&self, event: StatusEvent) -> Result<EventId> {
        tracing::debug!(
            event_type = event.event_type(),
            entity = %event.entity,
            "Appending event"
        );
        let result = self.inner.append(event).await;
        match &result {
            Ok(id) => tracing::trace!(event_id = %id, "Event appended"),
            Err(e) => tracing::error!(error = %e, "Event append failed"),
        }
        result
    }

    async fn history(&self, entity: &EntityKey) -> Result<Vec<StatusEvent>> {
        tracing::debug!(entity = %entity, "Reading event history");
        self.inner.history(entity).await
    }

    async fn last_event(&self, entity: &EntityKey) -> Result<Option<StatusEvent>> {
        self.inner.last_event(entity).await
    }

    async fn count(&self, entity: &EntityKey) -> Result<usize> {
        self.inner.count(entity).await
    }
}
