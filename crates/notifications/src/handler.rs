//! Notification handlers and their registry.

use std::sync::Arc;

use async_trait::async_trait;
use converge_core::NotificationChannel;

use crate::error::Result;
use crate::event::Notification;
use crate::types::NotificationType;

/// Delivers notifications of some types over one channel.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    fn name(&self) -> &str;

    /// The channel this handler delivers on.
    fn channel(&self) -> NotificationChannel;

    /// Notification types this handler can render.
    fn supported_types(&self) -> &[NotificationType];

    /// Send one message to `address`.
    async fn send_message(&self, notification: &Notification, address: &str) -> Result<()>;
}

/// Immutable set of handlers, looked up by channel and type.
#[derive(Default)]
pub struct NotificationHandlers {
    handlers: Vec<Arc<dyn NotificationHandler>>,
}

impl NotificationHandlers {
    #[must_use]
    pub fn new(handlers: Vec<Arc<dyn NotificationHandler>>) -> Self {
        Self { handlers }
    }

    /// The first handler on `channel` that supports `kind`.
    #[must_use]
    pub fn supporting(
        &self,
        channel: NotificationChannel,
        kind: NotificationType,
    ) -> Option<&Arc<dyn NotificationHandler>> {
        self.handlers
            .iter()
            .find(|h| h.channel() == channel && h.supported_types().contains(&kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for NotificationHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("NotificationHandlers")
            .field("handlers", &names)
            .finish()
    }
}
