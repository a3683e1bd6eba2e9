//! Event bus: append to the log, then fan out to subscribers.
//!
//! There is one broadcast channel per bus. Each subscription carries its own
//! [`EventFilter`] and skips events that do not match on receipt.

use std::sync::Arc;

use converge_core::EntityKey;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::event::StatusEvent;
use crate::store::EventLog;
use crate::types::EventId;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Narrows a subscription. Empty filter matches everything; each populated
/// field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    entity: Option<EntityKey>,
    application: Option<String>,
    event_types: Vec<&'static str>,
}

impl EventFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entity(mut self, key: EntityKey) -> Self {
        self.entity = Some(key);
        self
    }

    #[must_use]
    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    /// Only events whose [`StatusEvent::event_type`] is one of `types`.
    #[must_use]
    pub fn event_types(mut self, types: &[&'static str]) -> Self {
        self.event_types.extend_from_slice(types);
        self
    }

    #[must_use]
    pub fn matches(&self, event: &StatusEvent) -> bool {
        self.entity.as_ref().is_none_or(|key| event.entity == *key)
            && self
                .application
                .as_deref()
                .is_none_or(|app| event.entity.application == app)
            && (self.event_types.is_empty() || self.event_types.contains(&event.event_type()))
    }
}

/// A live view of published events.
pub struct EventSubscription {
    receiver: broadcast::Receiver<StatusEvent>,
    filter: EventFilter,
}

impl EventSubscription {
    /// Wait for the next matching event.
    ///
    /// # Errors
    ///
    /// `Error::ChannelClosed` once the bus is gone, `Error::Lagged` if this
    /// subscriber fell behind and events were dropped.
    pub async fn recv(&mut self) -> Result<StatusEvent> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => Error::ChannelClosed,
                broadcast::error::RecvError::Lagged(skipped) => Error::Lagged { skipped },
            })?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// The next matching event already queued, if any.
    #[must_use]
    pub fn try_recv(&mut self) -> Option<StatusEvent> {
        while let Ok(event) = self.receiver.try_recv() {
            if self.filter.matches(&event) {
                return Some(event);
            }
        }
        None
    }

    #[must_use]
    pub const fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

/// Publishes status events: durable append first, broadcast second.
pub struct EventBus {
    log: Arc<dyn EventLog>,
    sender: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self { log, sender }
    }

    /// Append `event` and hand it to current subscribers.
    ///
    /// Subscribers only ever see events the log already holds.
    ///
    /// # Errors
    ///
    /// The log's error if the append fails. Nothing is broadcast then.
    pub async fn publish(&self, event: StatusEvent) -> Result<EventId> {
        let event_id = self.log.append(event.clone()).await?;

        debug!(
            event_id = %event_id,
            event_type = event.event_type(),
            entity = %event.entity,
            "Published status event"
        );

        if let Ok(receivers) = self.sender.send(event) {
            trace!(receivers, "Broadcast status event");
        }

        Ok(event_id)
    }

    /// Subscribe to everything published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription {
        self.subscribe_filtered(EventFilter::all())
    }

    #[must_use]
    pub fn subscribe_filtered(&self, filter: EventFilter) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn log(&self) -> &Arc<dyn EventLog> {
        &self.log
    }
}

/// Builder for [`EventBus`].
#[derive(Default)]
pub struct EventBusBuilder {
    log: Option<Arc<dyn EventLog>>,
    capacity: Option<usize>,
}

impl EventBusBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Events a slow subscriber may fall behind by before it lags.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// # Errors
    ///
    /// `Error::InvalidEvent` if no log was given or the capacity is zero.
    pub fn build(self) -> Result<EventBus> {
        let log = self
            .log
            .ok_or_else(|| Error::invalid_event("event bus needs an event log"))?;
        let capacity = self.capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        if capacity == 0 {
            return Err(Error::invalid_event("event bus capacity must be positive"));
        }

        let (sender, _) = broadcast::channel(capacity);
        Ok(EventBus { log, sender })
    }
}
