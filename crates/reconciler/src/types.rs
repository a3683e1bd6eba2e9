//! Core types for the reconciler.

use std::fmt;

use converge_core::EntityKey;
use converge_diff::Diff;
use converge_events::TaskRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque job for the actuator to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub entity: EntityKey,
    /// Human-readable description, used as the task name.
    pub description: String,
    /// Provider-specific payload. Never inspected by the engine.
    pub job: Value,
}

impl OrchestrationRequest {
    pub fn new(entity: EntityKey, description: impl Into<String>, job: Value) -> Self {
        Self {
            entity,
            description: description.into(),
            job,
        }
    }
}

/// Handle to the tasks an actuator started for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub tasks: Vec<TaskRef>,
}

impl TaskHandle {
    #[must_use]
    pub const fn new(tasks: Vec<TaskRef>) -> Self {
        Self { tasks }
    }

    #[must_use]
    pub fn single(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(vec![TaskRef::new(id, name)])
    }
}

/// How a change is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    /// Current state is absent.
    Create,
    /// Current state exists but differs.
    Update,
    /// An upstream precondition is unmet; nothing will be requested.
    FailedPreconditions,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
            Self::FailedPreconditions => write!(f, "FAILED_PRECONDITIONS"),
        }
    }
}

/// What a converge would change, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub kind: ChangeKind,
    pub diff: Diff,
    pub messages: Vec<String>,
}

impl ChangeSummary {
    #[must_use]
    pub fn new(kind: ChangeKind, diff: Diff) -> Self {
        let messages = diff.messages();
        Self {
            kind,
            diff,
            messages,
        }
    }

    #[must_use]
    pub fn failed_preconditions(diff: Diff, reasons: Vec<String>) -> Self {
        Self {
            kind: ChangeKind::FailedPreconditions,
            diff,
            messages: reasons,
        }
    }
}

/// Result of one converge attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvergeOutcome {
    /// Current state already matches desired state.
    Unchanged,
    /// Something must change. With `FailedPreconditions`, `requests` is empty.
    Actions {
        requests: Vec<OrchestrationRequest>,
        summary: ChangeSummary,
    },
    /// Current state could not be read (transport or lookup failure).
    CheckError { error: String },
    /// The desired state cannot currently be evaluated.
    Unresolvable { reason: String },
}

impl ConvergeOutcome {
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// The requests to run, empty unless this is `Actions`.
    #[must_use]
    pub fn requests(&self) -> &[OrchestrationRequest] {
        match self {
            Self::Actions { requests, .. } => requests,
            _ => &[],
        }
    }

    #[must_use]
    pub const fn summary(&self) -> Option<&ChangeSummary> {
        match self {
            Self::Actions { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// Why a check was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Actuation is paused for the entity or its application.
    Paused,
    /// Another check for the same entity is still running.
    InFlight,
    /// Drift remains but tasks from an earlier launch have not reported back.
    ActuationInProgress,
    /// A veto denied actuation.
    Vetoed,
}

/// What one check did, after events were recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Skipped(SkipReason),
    /// In sync and nothing was outstanding.
    Valid,
    /// In sync after a previous delta or task.
    Resolved,
    /// In sync, but a launched task has not reported back yet.
    Waiting,
    /// Corrective tasks were launched.
    Launched { kind: ChangeKind, tasks: Vec<TaskRef> },
    Unresolvable { reason: String },
    Errored { error: String },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_non_action_outcomes_have_no_requests() {
        assert!(ConvergeOutcome::Unchanged.requests().is_empty());
        assert!(ConvergeOutcome::Unchanged.summary().is_none());
        let err = ConvergeOutcome::CheckError {
            error: "boom".to_string(),
        };
        assert!(err.requests().is_empty());
    }

    #[test]
    fn test_change_kind_serializes_screaming() {
        let value = serde_json::to_value(ChangeKind::FailedPreconditions).ok();
        assert_eq!(value, Some(json!("FAILED_PRECONDITIONS")));
        assert_eq!(ChangeKind::Create.to_string(), "CREATE");
    }

    #[test]
    fn test_task_handle_single() {
        let handle = TaskHandle::single("01HX", "Deploy fnord");
        assert_eq!(handle.tasks.len(), 1);
    }
}
