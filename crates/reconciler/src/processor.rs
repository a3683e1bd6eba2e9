//! Per-kind resource processors and their registry.

use std::sync::Arc;

use async_trait::async_trait;
use converge_core::{ManagedEntity, ResourceKind};
use converge_diff::{Diff, DiffOptions};
use serde_json::Value;

use crate::actuator::Actuator;
use crate::error::{Error, Result};
use crate::types::OrchestrationRequest;

/// Kind-specific knowledge: how to compare, what must exist first, and
/// which jobs close a gap.
#[async_trait]
pub trait ResourceProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this processor handles entities of `kind`.
    fn supports(&self, kind: &ResourceKind) -> bool;

    /// Ignored fields, mutators and list keys for this kind.
    fn diff_options(&self) -> DiffOptions {
        DiffOptions::new()
    }

    /// The desired state in comparable form.
    ///
    /// # Errors
    ///
    /// `Error::Validation` if the spec is malformed.
    fn desired(&self, entity: &ManagedEntity) -> converge_core::Result<Value> {
        Ok(entity.spec.payload.clone())
    }

    /// The current state in the same form as [`desired`](Self::desired).
    ///
    /// # Errors
    ///
    /// Whatever the actuator reports.
    async fn current(
        &self,
        entity: &ManagedEntity,
        actuator: &dyn Actuator,
    ) -> converge_core::Result<Option<Value>> {
        actuator.get_current(&entity.spec).await
    }

    /// Check kind-specific upstream requirements.
    ///
    /// # Errors
    ///
    /// `Error::Lookup` for a missing upstream reference.
    async fn check_preconditions(&self, _entity: &ManagedEntity) -> converge_core::Result<()> {
        Ok(())
    }

    /// Jobs that would bring current state to desired state.
    ///
    /// # Errors
    ///
    /// `Error::Validation` if no job can be built from the spec.
    fn actions(
        &self,
        entity: &ManagedEntity,
        diff: &Diff,
        current_present: bool,
    ) -> converge_core::Result<Vec<OrchestrationRequest>>;
}

/// Immutable lookup table from kind to processor.
///
/// Support sets must be disjoint; exactly one processor handles a kind.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: Vec<Arc<dyn ResourceProcessor>>,
}

impl ProcessorRegistry {
    /// Build a registry, checking that no kind in `kinds` is claimed twice.
    ///
    /// # Errors
    ///
    /// `Error::DuplicateProcessor` naming the first conflict found.
    pub fn new(
        processors: Vec<Arc<dyn ResourceProcessor>>,
        kinds: &[ResourceKind],
    ) -> Result<Self> {
        for kind in kinds {
            let mut claiming = processors.iter().filter(|p| p.supports(kind));
            if let (Some(first), Some(second)) = (claiming.next(), claiming.next()) {
                return Err(Error::duplicate_processor(kind, first.name(), second.name()));
            }
        }
        Ok(Self { processors })
    }

    /// The processor for `kind`.
    ///
    /// # Errors
    ///
    /// `Error::NoProcessor` if none supports it, `Error::DuplicateProcessor`
    /// if more than one does.
    pub fn resolve(&self, kind: &ResourceKind) -> Result<&Arc<dyn ResourceProcessor>> {
        let mut claiming = self.processors.iter().filter(|p| p.supports(kind));
        match (claiming.next(), claiming.next()) {
            (Some(only), None) => Ok(only),
            (Some(first), Some(second)) => {
                Err(Error::duplicate_processor(kind, first.name(), second.name()))
            }
            (None, _) => Err(Error::no_processor(kind)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.processors.iter().map(|p| p.name()))
            .finish()
    }
}
