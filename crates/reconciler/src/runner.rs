//! Running checks: converge, act, and record what happened.

use std::sync::Arc;
use std::time::Duration;

use converge_core::{CheckConfig, EntityKey, ErrorKind, ManagedEntity};
use converge_events::{EventBus, StatusEvent, StatusEventKind, TaskRef, actuation_in_progress};
use dashmap::DashMap;
use itertools::Itertools;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::pauser::ActuationPauser;
use crate::reconciler::Reconciler;
use crate::types::{ChangeKind, ChangeSummary, CheckOutcome, ConvergeOutcome, OrchestrationRequest, SkipReason};
use crate::veto::{VetoEnforcer, VetoResponse};

/// Runs checks for entities and records their outcome as status events.
///
/// At most one check per entity key is in flight at any time, and no new
/// tasks are launched for an entity while earlier ones are outstanding.
/// Checks for different entities are independent and each gets its own
/// deadline.
pub struct CheckRunner {
    reconciler: Arc<Reconciler>,
    bus: Arc<EventBus>,
    pauser: Arc<ActuationPauser>,
    vetoes: VetoEnforcer,
    in_flight: DashMap<EntityKey, Arc<Mutex<()>>>,
    timeout: Duration,
    max_concurrent: usize,
}

/// Results of a batch of checks, sorted by entity key.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<(EntityKey, CheckOutcome)>,
    pub failed: Vec<(EntityKey, String)>,
    /// Checks whose task panicked or was cancelled.
    pub aborted: usize,
}

impl BatchReport {
    #[must_use]
    pub fn outcome(&self, key: &EntityKey) -> Option<&CheckOutcome> {
        self.completed
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, outcome)| outcome)
    }

    /// Whether every completed check found its entity in sync.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.failed.is_empty()
            && self.aborted == 0
            && self
                .completed
                .iter()
                .all(|(_, o)| matches!(o, CheckOutcome::Valid | CheckOutcome::Resolved))
    }
}

impl CheckRunner {
    #[must_use]
    pub fn new(
        reconciler: Arc<Reconciler>,
        bus: Arc<EventBus>,
        pauser: Arc<ActuationPauser>,
        config: &CheckConfig,
    ) -> Self {
        Self {
            reconciler,
            bus,
            pauser,
            vetoes: VetoEnforcer::default(),
            in_flight: DashMap::new(),
            timeout: config.timeout(),
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    /// Consult `vetoes` before launching any task.
    #[must_use]
    pub fn with_vetoes(mut self, vetoes: VetoEnforcer) -> Self {
        self.vetoes = vetoes;
        self
    }

    /// Entities with a check running right now.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Check one entity and record the result.
    ///
    /// # Errors
    ///
    /// Caller errors from [`Reconciler::converge`] (validation, no processor,
    /// shape mismatch) and event log failures. Nothing is recorded for those.
    pub async fn check(&self, entity: &ManagedEntity) -> Result<CheckOutcome> {
        let key = &entity.key;
        if self.pauser.is_paused(key).await {
            debug!(entity = %key, "Actuation paused, skipping check");
            return Ok(CheckOutcome::Skipped(SkipReason::Paused));
        }

        let lock = Arc::clone(self.in_flight.entry(key.clone()).or_default().value());
        let Ok(guard) = lock.try_lock_owned() else {
            debug!(entity = %key, "Check already in flight, skipping");
            return Ok(CheckOutcome::Skipped(SkipReason::InFlight));
        };

        let result = self.check_locked(entity).await;

        drop(guard);
        self.in_flight.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn check_locked(&self, entity: &ManagedEntity) -> Result<CheckOutcome> {
        let key = &entity.key;
        let history = self.bus.log().history(key).await?;
        if history.is_empty() {
            self.bus.publish(StatusEvent::created(key.clone())).await?;
        }
        let in_progress = actuation_in_progress(&history);

        let deadline = Instant::now()
            .checked_add(self.timeout)
            .ok_or_else(|| converge_core::Error::validation("check.timeout_ms", "deadline overflows"))?;
        let outcome = match timeout_at(deadline, self.reconciler.converge(entity)).await {
            Ok(outcome) => outcome?,
            Err(_) => return self.record_timeout(key).await,
        };

        match outcome {
            ConvergeOutcome::Unchanged => self.record_unchanged(key, in_progress).await,
            ConvergeOutcome::Actions { summary, .. }
                if summary.kind == ChangeKind::FailedPreconditions =>
            {
                let reason = summary.messages.join("; ");
                self.record_unresolvable(key, reason).await
            }
            ConvergeOutcome::Actions { .. } if in_progress => {
                debug!(entity = %key, "Earlier tasks still running, not launching again");
                Ok(CheckOutcome::Skipped(SkipReason::ActuationInProgress))
            }
            ConvergeOutcome::Actions { requests, summary } => {
                match timeout_at(deadline, self.vetoes.can_check(entity)).await {
                    Ok(Ok(VetoResponse::Allowed)) => {
                        self.launch(key, requests, summary, deadline).await
                    }
                    Ok(Ok(VetoResponse::Denied { veto, reason })) => {
                        self.record_vetoed(key, &veto, &reason).await
                    }
                    Ok(Err(e)) => self.record_error(key, e.to_string()).await,
                    Err(_) => self.record_timeout(key).await,
                }
            }
            ConvergeOutcome::CheckError { error } => self.record_error(key, error).await,
            ConvergeOutcome::Unresolvable { reason } => self.record_unresolvable(key, reason).await,
        }
    }

    /// Check many entities concurrently, each on its own task.
    ///
    /// One entity's failure never affects the others.
    pub async fn check_all(self: &Arc<Self>, entities: Vec<ManagedEntity>) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for entity in entities {
            let runner = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let result = runner.check(&entity).await;
                (entity.key, result)
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, Ok(outcome))) => report.completed.push((key, outcome)),
                Ok((key, Err(e))) => {
                    error!(entity = %key, error = %e, "Check rejected");
                    report.failed.push((key, e.to_string()));
                }
                Err(e) => {
                    error!(error = %e, "Check task aborted");
                    report.aborted += 1;
                }
            }
        }

        report.completed = report
            .completed
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .collect();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }

    /// Record the result of tasks launched by an earlier check.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be appended.
    pub async fn record_task_result(
        &self,
        key: &EntityKey,
        tasks: Vec<TaskRef>,
        result: std::result::Result<(), String>,
    ) -> Result<()> {
        let event = match result {
            Ok(()) => StatusEvent::task_succeeded(key.clone(), tasks),
            Err(reason) => {
                warn!(entity = %key, reason = %reason, "Task failed");
                StatusEvent::task_failed(key.clone(), reason, tasks)
            }
        };
        self.bus.publish(event).await?;
        Ok(())
    }

    #[must_use]
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    async fn launch(
        &self,
        key: &EntityKey,
        requests: Vec<OrchestrationRequest>,
        summary: ChangeSummary,
        deadline: Instant,
    ) -> Result<CheckOutcome> {
        let detected = match summary.kind {
            ChangeKind::Create => {
                warn!(entity = %key, "Resource missing");
                StatusEvent::missing(key.clone())
            }
            _ => {
                warn!(entity = %key, paths = ?summary.diff.paths(), "Delta detected");
                StatusEvent::delta_detected(key.clone(), summary.diff.to_delta_json())
            }
        };
        self.bus.publish(detected).await?;

        let actuator = self.reconciler.actuator();
        let mut tasks = Vec::new();
        for request in &requests {
            match timeout_at(deadline, actuator.execute(request)).await {
                Ok(Ok(handle)) => tasks.extend(handle.tasks),
                Ok(Err(e)) => {
                    self.record_launched(key, tasks).await?;
                    return match e.kind() {
                        ErrorKind::Unresolvable => self.record_unresolvable(key, e.to_string()).await,
                        _ => self.record_error(key, e.to_string()).await,
                    };
                }
                Err(_) => {
                    self.record_launched(key, tasks).await?;
                    return self.record_timeout(key).await;
                }
            }
        }

        info!(entity = %key, change = %summary.kind, tasks = tasks.len(), "Actuation launched");
        self.record_launched(key, tasks.clone()).await?;
        Ok(CheckOutcome::Launched {
            kind: summary.kind,
            tasks,
        })
    }

    async fn record_launched(&self, key: &EntityKey, tasks: Vec<TaskRef>) -> Result<()> {
        if !tasks.is_empty() {
            let actuator = self.reconciler.actuator().name().to_string();
            self.bus
                .publish(StatusEvent::actuation_launched(key.clone(), actuator, tasks))
                .await?;
        }
        Ok(())
    }

    async fn record_unchanged(&self, key: &EntityKey, in_progress: bool) -> Result<CheckOutcome> {
        if in_progress {
            debug!(entity = %key, "Waiting for launched tasks");
            return Ok(CheckOutcome::Waiting);
        }
        let last = self.bus.log().last_event(key).await?.map(|e| e.kind);
        match last {
            Some(
                StatusEventKind::DeltaDetected { .. }
                | StatusEventKind::TaskSucceeded { .. }
                | StatusEventKind::TaskFailed { .. },
            ) => {
                info!(entity = %key, "Delta resolved");
                self.bus.publish(StatusEvent::delta_resolved(key.clone())).await?;
                Ok(CheckOutcome::Resolved)
            }
            _ => {
                debug!(entity = %key, "Valid");
                self.bus.publish(StatusEvent::valid(key.clone())).await?;
                Ok(CheckOutcome::Valid)
            }
        }
    }

    async fn record_vetoed(&self, key: &EntityKey, veto: &str, reason: &str) -> Result<CheckOutcome> {
        info!(entity = %key, veto = %veto, reason = %reason, "Actuation vetoed");
        self.bus
            .publish(StatusEvent::actuation_vetoed(key.clone(), format!("{veto}: {reason}")))
            .await?;
        Ok(CheckOutcome::Skipped(SkipReason::Vetoed))
    }

    async fn record_error(&self, key: &EntityKey, error: String) -> Result<CheckOutcome> {
        error!(entity = %key, error = %error, "Check error");
        self.bus
            .publish(StatusEvent::check_error(key.clone(), error.clone()))
            .await?;
        Ok(CheckOutcome::Errored { error })
    }

    async fn record_unresolvable(&self, key: &EntityKey, reason: String) -> Result<CheckOutcome> {
        warn!(entity = %key, reason = %reason, "Check unresolvable");
        self.bus
            .publish(StatusEvent::check_unresolvable(key.clone(), reason.clone()))
            .await?;
        Ok(CheckOutcome::Unresolvable { reason })
    }

    async fn record_timeout(&self, key: &EntityKey) -> Result<CheckOutcome> {
        let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        self.record_error(key, converge_core::Error::timeout(millis).to_string())
            .await
    }
}
