//! Delivery config lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use converge_core::DeliveryConfig;
use tokio::sync::RwLock;

use crate::error::Result;

/// Source of delivery configs.
#[async_trait]
pub trait DeliveryConfigRepository: Send + Sync {
    /// The delivery config of an application, if it has one.
    async fn get_for_application(&self, application: &str) -> Result<Option<DeliveryConfig>>;

    /// A delivery config by name.
    async fn get_by_name(&self, name: &str) -> Result<Option<DeliveryConfig>>;
}

/// In-memory repository keyed by config name.
#[derive(Default)]
pub struct InMemoryDeliveryConfigRepository {
    configs: RwLock<HashMap<String, DeliveryConfig>>,
}

impl InMemoryDeliveryConfigRepository {
    #[must_use]
    pub fn new(configs: impl IntoIterator<Item = DeliveryConfig>) -> Self {
        Self {
            configs: RwLock::new(
                configs
                    .into_iter()
                    .map(|c| (c.name.clone(), c))
                    .collect(),
            ),
        }
    }

    /// Store a config, replacing any config with the same name.
    pub async fn store(&self, config: DeliveryConfig) {
        self.configs.write().await.insert(config.name.clone(), config);
    }

    pub async fn remove(&self, name: &str) -> Option<DeliveryConfig> {
        self.configs.write().await.remove(name)
    }
}

#[async_trait]
impl DeliveryConfigRepository for InMemoryDeliveryConfigRepository {
    async fn get_for_application(&self, application: &str) -> Result<Option<DeliveryConfig>> {
        Ok(self
            .configs
            .read()
            .await
            .values()
            .find(|c| c.application == application)
            .cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<DeliveryConfig>> {
        Ok(self.configs.read().await.get(name).cloned())
    }
}
