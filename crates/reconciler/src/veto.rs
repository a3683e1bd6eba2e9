//! Vetoes: external rules that can block actuation of an entity.

use std::sync::Arc;

use async_trait::async_trait;
use converge_core::{ManagedEntity, Result};

/// A veto's answer for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VetoResponse {
    Allowed,
    Denied { veto: String, reason: String },
}

impl VetoResponse {
    pub fn denied(veto: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Denied {
            veto: veto.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Consulted before any corrective task is launched.
#[async_trait]
pub trait ActuationVeto: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Transport failures reading whatever the veto is based on.
    async fn can_check(&self, entity: &ManagedEntity) -> Result<VetoResponse>;
}

/// Ordered set of vetoes. The first denial wins.
#[derive(Clone, Default)]
pub struct VetoEnforcer {
    vetoes: Vec<Arc<dyn ActuationVeto>>,
}

impl VetoEnforcer {
    #[must_use]
    pub fn new(vetoes: Vec<Arc<dyn ActuationVeto>>) -> Self {
        Self { vetoes }
    }

    /// # Errors
    ///
    /// The first error any veto returns.
    pub async fn can_check(&self, entity: &ManagedEntity) -> Result<VetoResponse> {
        for veto in &self.vetoes {
            let response = veto.can_check(entity).await?;
            if !response.is_allowed() {
                return Ok(response);
            }
        }
        Ok(VetoResponse::Allowed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vetoes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vetoes.is_empty()
    }
}

impl std::fmt::Debug for VetoEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.vetoes.iter().map(|v| v.name()).collect();
        f.debug_struct("VetoEnforcer").field("vetoes", &names).finish()
    }
}
