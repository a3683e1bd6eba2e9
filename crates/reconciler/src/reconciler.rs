//! The converge decision: fetch, diff, check preconditions, plan.

use std::sync::Arc;

use converge_core::{ErrorKind, ManagedEntity};
use converge_diff::{Diff, diff, empty_like};
use tracing::{debug, info, warn};

use crate::actuator::{Actuator, ApplicationDirectory};
use crate::error::{Error, Result};
use crate::processor::ProcessorRegistry;
use crate::types::{ChangeKind, ChangeSummary, ConvergeOutcome};

/// Decides what, if anything, must change for an entity.
///
/// The reconciler never appends events and never executes requests. It only
/// reads current state and returns a [`ConvergeOutcome`]; recording and acting
/// on it is the caller's job (see [`CheckRunner`](crate::CheckRunner)).
pub struct Reconciler {
    registry: ProcessorRegistry,
    actuator: Arc<dyn Actuator>,
    applications: Option<Arc<dyn ApplicationDirectory>>,
}

impl Reconciler {
    /// Create a new reconciler.
    #[must_use]
    pub fn new(registry: ProcessorRegistry, actuator: Arc<dyn Actuator>) -> Self {
        Self {
            registry,
            actuator,
            applications: None,
        }
    }

    /// Require owning applications to exist before anything is planned.
    #[must_use]
    pub fn with_application_directory(mut self, applications: Arc<dyn ApplicationDirectory>) -> Self {
        self.applications = Some(applications);
        self
    }

    /// Compare one entity's current state against its desired state.
    ///
    /// Actuator and precondition failures are folded into the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only for caller mistakes: no processor for the kind,
    /// a malformed spec, or desired/current values of different shapes.
    pub async fn converge(&self, entity: &ManagedEntity) -> Result<ConvergeOutcome> {
        let processor = self.registry.resolve(entity.kind())?;
        let desired = processor.desired(entity)?;

        let current = match processor.current(entity, self.actuator.as_ref()).await {
            Ok(current) => current,
            Err(e) => return recover(entity, e),
        };
        let current_present = current.is_some();
        let current = current.unwrap_or_else(|| empty_like(&desired));

        let delta = diff(&current, &desired, &processor.diff_options())?;

        let mut unmet = Vec::new();
        if let Some(applications) = &self.applications {
            match applications.application_exists(entity.application()).await {
                Ok(true) => {}
                Ok(false) => unmet.push(format!("application '{}' not found", entity.application())),
                Err(e) => return recover(entity, e),
            }
        }
        match processor.check_preconditions(entity).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Lookup => unmet.push(e.to_string()),
            Err(e) => return recover(entity, e),
        }
        if !unmet.is_empty() {
            warn!(entity = %entity.key, reasons = ?unmet, "Preconditions not met");
            return Ok(ConvergeOutcome::Actions {
                requests: Vec::new(),
                summary: ChangeSummary::failed_preconditions(delta, unmet),
            });
        }

        if delta.is_empty() {
            debug!(entity = %entity.key, "Up to date");
            return Ok(ConvergeOutcome::Unchanged);
        }

        let requests = match processor.actions(entity, &delta, current_present) {
            Ok(requests) => requests,
            Err(e) => return recover(entity, e),
        };
        let kind = if current_present {
            ChangeKind::Update
        } else {
            ChangeKind::Create
        };
        info!(
            entity = %entity.key,
            processor = processor.name(),
            change = %kind,
            paths = delta.len(),
            requests = requests.len(),
            "Planned convergence"
        );

        Ok(ConvergeOutcome::Actions {
            requests,
            summary: ChangeSummary::new(kind, delta),
        })
    }

    /// Preview the diff without planning anything.
    ///
    /// # Errors
    ///
    /// As [`converge`](Self::converge), plus actuator errors are returned as-is.
    pub async fn diff(&self, entity: &ManagedEntity) -> Result<Diff> {
        let processor = self.registry.resolve(entity.kind())?;
        let desired = processor.desired(entity)?;
        let current = processor
            .current(entity, self.actuator.as_ref())
            .await?
            .unwrap_or_else(|| empty_like(&desired));
        Ok(diff(&current, &desired, &processor.diff_options())?)
    }

    #[must_use]
    pub fn actuator(&self) -> &Arc<dyn Actuator> {
        &self.actuator
    }

    #[must_use]
    pub const fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }
}

/// Turn a collaborator failure into an outcome. Validation errors are the
/// submitter's problem and propagate.
fn recover(entity: &ManagedEntity, error: converge_core::Error) -> Result<ConvergeOutcome> {
    match error.kind() {
        ErrorKind::Validation => Err(Error::Core(error)),
        ErrorKind::Unresolvable => {
            warn!(entity = %entity.key, error = %error, "Desired state unresolvable");
            Ok(ConvergeOutcome::Unresolvable {
                reason: error.to_string(),
            })
        }
        ErrorKind::Lookup | ErrorKind::Transport | ErrorKind::Config => {
            warn!(entity = %entity.key, error = %error, "Check failed");
            Ok(ConvergeOutcome::CheckError {
                error: error.to_string(),
            })
        }
    }
}

/// Builder for [`Reconciler`].
#[derive(Default)]
pub struct ReconcilerBuilder {
    registry: Option<ProcessorRegistry>,
    actuator: Option<Arc<dyn Actuator>>,
    applications: Option<Arc<dyn ApplicationDirectory>>,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_registry(mut self, registry: ProcessorRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn with_actuator(mut self, actuator: Arc<dyn Actuator>) -> Self {
        self.actuator = Some(actuator);
        self
    }

    #[must_use]
    pub fn with_application_directory(mut self, applications: Arc<dyn ApplicationDirectory>) -> Self {
        self.applications = Some(applications);
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// `Error::InvalidConfig` if the actuator is missing or the registry is empty.
    pub fn build(self) -> Result<Reconciler> {
        let actuator = self
            .actuator
            .ok_or_else(|| Error::invalid_config("Actuator is required"))?;
        let registry = self.registry.unwrap_or_default();
        if registry.is_empty() {
            return Err(Error::invalid_config("At least one processor is required"));
        }

        Ok(Reconciler {
            registry,
            actuator,
            applications: self.applications,
        })
    }
}
