//! Status derivation from event history.
//!
//! Status is never stored. [`StatusDeriver`] recomputes it from the full
//! history every time it is asked, so it cannot drift from the log.

use std::fmt;
use std::sync::Arc;

use converge_core::{EntityKey, StatusConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::{StatusEvent, StatusEventKind};
use crate::projection::Projection;
use crate::store::EventLog;

/// Default number of unresolved detect/actuate cycles before an entity is
/// reported unhappy.
pub const DEFAULT_FLAPPING_THRESHOLD: u32 = 5;

/// Coarse, operator-facing status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Registered, no check outcome yet.
    Created,
    /// Out of sync and not yet being acted on.
    Diff,
    /// Corrective tasks are running.
    Actuating,
    /// In sync.
    Happy,
    /// Stuck in a detect/actuate loop.
    Unhappy,
    /// The most recent check failed.
    Error,
}

impl Status {
    #[must_use]
    pub const fn is_terminal_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Diff => "DIFF",
            Self::Actuating => "ACTUATING",
            Self::Happy => "HAPPY",
            Self::Unhappy => "UNHAPPY",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// The events that move status. Everything else is neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Milestone {
    Created,
    Missing,
    DeltaDetected,
    ActuationLaunched,
    Resolved,
    CheckError,
    TaskFailed,
    TaskSucceeded,
}

impl Milestone {
    const fn of(kind: &StatusEventKind) -> Option<Self> {
        match kind {
            StatusEventKind::Created => Some(Self::Created),
            StatusEventKind::Missing => Some(Self::Missing),
            StatusEventKind::DeltaDetected { .. } => Some(Self::DeltaDetected),
            StatusEventKind::ActuationLaunched { .. } => Some(Self::ActuationLaunched),
            StatusEventKind::DeltaResolved | StatusEventKind::Valid => Some(Self::Resolved),
            StatusEventKind::CheckError { .. } => Some(Self::CheckError),
            StatusEventKind::TaskFailed { .. } => Some(Self::TaskFailed),
            StatusEventKind::TaskSucceeded { .. } => Some(Self::TaskSucceeded),
            StatusEventKind::CheckUnresolvable { .. }
            | StatusEventKind::ActuationPaused { .. }
            | StatusEventKind::ActuationResumed { .. }
            | StatusEventKind::ActuationVetoed { .. } => None,
        }
    }
}

/// Intermediate fold state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFold {
    last: Option<Milestone>,
    unresolved_cycles: u32,
    delta_pending: bool,
}

impl StatusFold {
    /// Detect/actuate cycles since the last resolution.
    #[must_use]
    pub const fn unresolved_cycles(&self) -> u32 {
        self.unresolved_cycles
    }
}

/// Pure function from history to [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDeriver {
    flapping_threshold: u32,
}

impl Default for StatusDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_FLAPPING_THRESHOLD)
    }
}

impl StatusDeriver {
    /// A threshold of zero is treated as one.
    #[must_use]
    pub fn new(flapping_threshold: u32) -> Self {
        Self {
            flapping_threshold: flapping_threshold.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &StatusConfig) -> Self {
        Self::new(config.flapping_threshold)
    }

    #[must_use]
    pub const fn flapping_threshold(&self) -> u32 {
        self.flapping_threshold
    }

    /// Derive status from a history, oldest first.
    #[must_use]
    pub fn derive(&self, history: &[StatusEvent]) -> Status {
        self.status_of(&self.fold(history))
    }

    /// Map a completed fold to a status.
    #[must_use]
    pub fn status_of(&self, fold: &StatusFold) -> Status {
        match fold.last {
            None | Some(Milestone::Created) => Status::Created,
            Some(Milestone::CheckError) => Status::Error,
            Some(_) if fold.unresolved_cycles >= self.flapping_threshold => Status::Unhappy,
            Some(Milestone::Missing | Milestone::DeltaDetected | Milestone::TaskFailed) => {
                Status::Diff
            }
            Some(Milestone::ActuationLaunched | Milestone::TaskSucceeded) => Status::Actuating,
            Some(Milestone::Resolved) => Status::Happy,
        }
    }
}

impl Projection for StatusDeriver {
    type State = StatusFold;

    fn initial_state(&self) -> Self::State {
        StatusFold::default()
    }

    fn apply(&self, state: &mut Self::State, event: &StatusEvent) {
        let Some(milestone) = Milestone::of(&event.kind) else {
            return;
        };
        match milestone {
            Milestone::Missing | Milestone::DeltaDetected => state.delta_pending = true,
            Milestone::ActuationLaunched if state.delta_pending => {
                state.unresolved_cycles = state.unresolved_cycles.saturating_add(1);
                state.delta_pending = false;
            }
            Milestone::Resolved => {
                state.unresolved_cycles = 0;
                state.delta_pending = false;
            }
            Milestone::TaskFailed | Milestone::TaskSucceeded => state.delta_pending = false,
            Milestone::Created | Milestone::CheckError | Milestone::ActuationLaunched => {}
        }
        state.last = Some(milestone);
    }
}

/// Whether tasks launched for the entity have yet to report back.
///
/// True when the most recent `ActuationLaunched` has no later task result
/// or resolution.
#[must_use]
pub fn actuation_in_progress(history: &[StatusEvent]) -> bool {
    history
        .iter()
        .rev()
        .find_map(|event| match event.kind {
            StatusEventKind::ActuationLaunched { .. } => Some(true),
            StatusEventKind::TaskSucceeded { .. }
            | StatusEventKind::TaskFailed { .. }
            | StatusEventKind::DeltaResolved
            | StatusEventKind::Valid
            | StatusEventKind::Created => Some(false),
            _ => None,
        })
        .unwrap_or(false)
}

/// Answers status queries by reading the log and deriving on demand.
pub struct StatusService {
    log: Arc<dyn EventLog>,
    deriver: StatusDeriver,
}

impl StatusService {
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, deriver: StatusDeriver) -> Self {
        Self { log, deriver }
    }

    /// Current status of an entity.
    ///
    /// # Errors
    ///
    /// Returns `Error::EntityNotFound` if nothing was ever recorded for the
    /// entity, or the log's error if the read fails.
    pub async fn status(&self, entity: &EntityKey) -> Result<Status> {
        let history = self.log.history(entity).await?;
        if history.is_empty() {
            return Err(Error::entity_not_found(entity));
        }
        let status = self.deriver.derive(&history);
        tracing::trace!(entity = %entity, status = %status, events = history.len(), "Derived status");
        Ok(status)
    }

    #[must_use]
    pub const fn deriver(&self) -> &StatusDeriver {
        &self.deriver
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::InMemoryEventLog;

    fn key() -> EntityKey {
        EntityKey::new("ec2/cluster@v1", "fnord", "fnord-main")
    }

    fn cycles(n: usize) -> Vec<StatusEvent> {
        let mut events = vec![StatusEvent::created(key()), StatusEvent::missing(key())];
        for _ in 0..n {
            events.push(StatusEvent::delta_detected(key(), json!({})));
            events.push(StatusEvent::actuation_launched(key(), "ec2", vec![]));
        }
        events
    }

    #[test]
    fn test_empty_history_is_created() {
        assert_eq!(StatusDeriver::default().derive(&[]), Status::Created);
    }

    #[test]
    fn test_scenario_walks_through_statuses() {
        let deriver = StatusDeriver::default();
        let mut history = vec![StatusEvent::created(key())];
        assert_eq!(deriver.derive(&history), Status::Created);

        history.push(StatusEvent::missing(key()));
        assert_eq!(deriver.derive(&history), Status::Diff);

        history.push(StatusEvent::delta_detected(key(), json!({"/capacity/max": {}})));
        assert_eq!(deriver.derive(&history), Status::Diff);

        history.push(StatusEvent::actuation_launched(key(), "ec2", vec![]));
        assert_eq!(deriver.derive(&history), Status::Actuating);

        history.push(StatusEvent::delta_resolved(key()));
        assert_eq!(deriver.derive(&history), Status::Happy);
    }

    #[test]
    fn test_single_cycle_is_actuating() {
        assert_eq!(StatusDeriver::default().derive(&cycles(1)), Status::Actuating);
    }

    #[test]
    fn test_threshold_cycles_is_unhappy() {
        assert_eq!(StatusDeriver::default().derive(&cycles(5)), Status::Unhappy);
        assert_eq!(StatusDeriver::default().derive(&cycles(4)), Status::Actuating);
    }

    #[test]
    fn test_unhappy_overrides_diff() {
        let mut history = cycles(5);
        history.push(StatusEvent::delta_detected(key(), json!({})));
        assert_eq!(StatusDeriver::default().derive(&history), Status::Unhappy);
    }

    #[test]
    fn test_resolution_after_churn_is_happy() {
        let mut history = cycles(7);
        history.push(StatusEvent::delta_resolved(key()));
        assert_eq!(StatusDeriver::default().derive(&history), Status::Happy);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let deriver = StatusDeriver::from_config(&StatusConfig {
            flapping_threshold: 2,
        });
        assert_eq!(deriver.derive(&cycles(2)), Status::Unhappy);
        assert_eq!(StatusDeriver::new(0).flapping_threshold(), 1);
    }

    #[test]
    fn test_check_error_last_is_error() {
        let mut history = cycles(5);
        history.push(StatusEvent::check_error(key(), "connection refused"));
        assert_eq!(StatusDeriver::default().derive(&history), Status::Error);
    }

    #[test]
    fn test_neutral_events_are_skipped() {
        let mut history = cycles(1);
        history.push(StatusEvent::actuation_paused(key(), Some("ops@example.com".into())));
        history.push(StatusEvent::check_unresolvable(key(), "upstream missing"));
        assert_eq!(StatusDeriver::default().derive(&history), Status::Actuating);

        let fold = StatusDeriver::default().fold(&history);
        assert_eq!(fold.unresolved_cycles(), 1);
    }

    #[test]
    fn test_actuation_in_progress_until_task_reports() {
        let mut history = cycles(1);
        assert!(actuation_in_progress(&history));

        history.push(StatusEvent::actuation_paused(key(), None));
        history.push(StatusEvent::check_error(key(), "connection refused"));
        assert!(actuation_in_progress(&history));

        history.push(StatusEvent::task_failed(key(), "oom", vec![]));
        assert!(!actuation_in_progress(&history));
        assert!(!actuation_in_progress(&[]));
        assert!(!actuation_in_progress(&[StatusEvent::created(key())]));
    }

    #[test]
    fn test_task_outcomes() {
        let mut history = cycles(1);
        history.push(StatusEvent::task_succeeded(key(), vec![]));
        assert_eq!(StatusDeriver::default().derive(&history), Status::Actuating);

        history.push(StatusEvent::task_failed(key(), "oom", vec![]));
        assert_eq!(StatusDeriver::default().derive(&history), Status::Diff);
    }

    #[test]
    fn test_valid_counts_as_resolution() {
        let mut history = cycles(3);
        history.push(StatusEvent::valid(key()));
        let fold = StatusDeriver::default().fold(&history);
        assert_eq!(fold.unresolved_cycles(), 0);
        assert_eq!(StatusDeriver::default().status_of(&fold), Status::Happy);
    }

    #[tokio::test]
    async fn test_service_reads_log() {
        let log = InMemoryEventLog::new_arc();
        let service = StatusService::new(log.clone(), StatusDeriver::default());

        assert!(matches!(
            service.status(&key()).await,
            Err(Error::EntityNotFound { .. })
        ));

        for event in cycles(1) {
            log.append(event).await.unwrap();
        }
        assert_eq!(service.status(&key()).await.unwrap(), Status::Actuating);

        let rebuilt = service.deriver().rebuild(log.as_ref(), &key()).await.unwrap();
        assert_eq!(rebuilt.unresolved_cycles(), 1);
    }
}
