//! Status event types.

use chrono::{DateTime, Utc};
use converge_core::EntityKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EventId, TaskRef};

/// What was observed about an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StatusEventKind {
    /// The entity was first registered.
    Created,
    /// The underlying resource does not exist.
    Missing,
    /// Current and desired state differ.
    DeltaDetected { delta: Value },
    /// Corrective orchestration tasks were submitted.
    ActuationLaunched { actuator: String, tasks: Vec<TaskRef> },
    /// A previously detected delta is gone.
    DeltaResolved,
    /// Current state matches desired state.
    Valid,
    /// The check itself failed (transport error, timeout).
    CheckError { error: String },
    /// The desired state cannot currently be evaluated.
    CheckUnresolvable { reason: String },
    ActuationPaused { by: Option<String> },
    ActuationResumed { by: Option<String> },
    ActuationVetoed { reason: String },
    TaskFailed { reason: String, tasks: Vec<TaskRef> },
    TaskSucceeded { tasks: Vec<TaskRef> },
}

/// An immutable, timestamped observation of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub event_id: EventId,
    pub entity: EntityKey,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: StatusEventKind,
}

impl StatusEvent {
    /// Wrap a kind in a fresh envelope stamped now.
    #[must_use]
    pub fn new(entity: EntityKey, kind: StatusEventKind) -> Self {
        Self {
            event_id: EventId::new(),
            entity,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Create a new Created event.
    #[must_use]
    pub fn created(entity: EntityKey) -> Self {
        Self::new(entity, StatusEventKind::Created)
    }

    /// Create a new Missing event.
    #[must_use]
    pub fn missing(entity: EntityKey) -> Self {
        Self::new(entity, StatusEventKind::Missing)
    }

    /// Create a new DeltaDetected event.
    #[must_use]
    pub fn delta_detected(entity: EntityKey, delta: Value) -> Self {
        Self::new(entity, StatusEventKind::DeltaDetected { delta })
    }

    /// Create a new ActuationLaunched event.
    #[must_use]
    pub fn actuation_launched(
        entity: EntityKey,
        actuator: impl Into<String>,
        tasks: Vec<TaskRef>,
    ) -> Self {
        Self::new(
            entity,
            StatusEventKind::ActuationLaunched {
                actuator: actuator.into(),
                tasks,
            },
        )
    }

    #[must_use]
    pub fn delta_resolved(entity: EntityKey) -> Self {
        Self::new(entity, StatusEventKind::DeltaResolved)
    }

    #[must_use]
    pub fn valid(entity: EntityKey) -> Self {
        Self::new(entity, StatusEventKind::Valid)
    }

    #[must_use]
    pub fn check_error(entity: EntityKey, error: impl Into<String>) -> Self {
        Self::new(
            entity,
            StatusEventKind::CheckError {
                error: error.into(),
            },
        )
    }

    #[must_use]
    pub fn check_unresolvable(entity: EntityKey, reason: impl Into<String>) -> Self {
        Self::new(
            entity,
            StatusEventKind::CheckUnresolvable {
                reason: reason.into(),
            },
        )
    }

    #[must_use]
    pub fn actuation_paused(entity: EntityKey, by: Option<String>) -> Self {
        Self::new(entity, StatusEventKind::ActuationPaused { by })
    }

    #[must_use]
    pub fn actuation_resumed(entity: EntityKey, by: Option<String>) -> Self {
        Self::new(entity, StatusEventKind::ActuationResumed { by })
    }

    #[must_use]
    pub fn actuation_vetoed(entity: EntityKey, reason: impl Into<String>) -> Self {
        Self::new(
            entity,
            StatusEventKind::ActuationVetoed {
                reason: reason.into(),
            },
        )
    }

    #[must_use]
    pub fn task_failed(entity: EntityKey, reason: impl Into<String>, tasks: Vec<TaskRef>) -> Self {
        Self::new(
            entity,
            StatusEventKind::TaskFailed {
                reason: reason.into(),
                tasks,
            },
        )
    }

    #[must_use]
    pub fn task_succeeded(entity: EntityKey, tasks: Vec<TaskRef>) -> Self {
        Self::new(entity, StatusEventKind::TaskSucceeded { tasks })
    }

    /// Get the event type as a string.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

impl StatusEventKind {
    /// Get the event type as a string.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Missing => "missing",
            Self::DeltaDetected { .. } => "delta_detected",
            Self::ActuationLaunched { .. } => "actuation_launched",
            Self::DeltaResolved => "delta_resolved",
            Self::Valid => "valid",
            Self::CheckError { .. } => "check_error",
            Self::CheckUnresolvable { .. } => "check_unresolvable",
            Self::ActuationPaused { .. } => "actuation_paused",
            Self::ActuationResumed { .. } => "actuation_resumed",
            Self::ActuationVetoed { .. } => "actuation_vetoed",
            Self::TaskFailed { .. } => "task_failed",
            Self::TaskSucceeded { .. } => "task_succeeded",
        }
    }

    /// Events that say nothing about convergence progress.
    ///
    /// Status derivation looks past these and they never touch the
    /// flapping counter.
    #[must_use]
    pub const fn is_neutral(&self) -> bool {
        matches!(
            self,
            Self::ActuationPaused { .. }
                | Self::ActuationResumed { .. }
                | Self::ActuationVetoed { .. }
                | Self::CheckUnresolvable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use serde_json::json;

    use super::*;

    fn key() -> EntityKey {
        EntityKey::new("ec2/cluster@v1", "fnord", "fnord-main")
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(StatusEvent::created(key()).event_type(), "created");
        assert_eq!(
            StatusEvent::delta_detected(key(), json!({})).event_type(),
            "delta_detected"
        );
        assert_eq!(
            StatusEvent::actuation_launched(key(), "ec2", vec![]).event_type(),
            "actuation_launched"
        );
    }

    #[test]
    fn test_neutral_events() {
        assert!(StatusEvent::actuation_paused(key(), None).kind.is_neutral());
        assert!(StatusEvent::check_unresolvable(key(), "cycle").kind.is_neutral());
        assert!(!StatusEvent::check_error(key(), "boom").kind.is_neutral());
        assert!(!StatusEvent::valid(key()).kind.is_neutral());
    }

    #[test]
    fn test_serialized_shape_is_tagged() {
        let event = StatusEvent::check_error(key(), "connection refused");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], json!("CheckError"));
        assert_eq!(value["error"], json!("connection refused"));
        assert_eq!(value["entity"]["application"], json!("fnord"));

        let back: StatusEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
