//! Constraint state change types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Evaluation state of a constraint for one artifact version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintStatus {
    Pending,
    Pass,
    Fail,
    OverridePass,
    OverrideFail,
}

impl ConstraintStatus {
    /// Whether promotion may proceed.
    #[must_use]
    pub const fn passes(self) -> bool {
        matches!(self, Self::Pass | Self::OverridePass)
    }

    /// Whether promotion is blocked for good.
    #[must_use]
    pub const fn fails(self) -> bool {
        matches!(self, Self::Fail | Self::OverrideFail)
    }

    /// Whether a human overrode the evaluation.
    #[must_use]
    pub const fn is_override(self) -> bool {
        matches!(self, Self::OverridePass | Self::OverrideFail)
    }
}

impl std::fmt::Display for ConstraintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::OverridePass => "OVERRIDE_PASS",
            Self::OverrideFail => "OVERRIDE_FAIL",
        };
        write!(f, "{s}")
    }
}

/// A gating condition attached to an environment.
///
/// The `type` field selects the evaluator; the remaining attributes are
/// evaluator specific and carried opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(rename = "type")]
    pub constraint_type: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Constraint {
    pub fn new(constraint_type: impl Into<String>) -> Self {
        Self {
            constraint_type: constraint_type.into(),
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

/// Persisted evaluation state of a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintState {
    #[serde(rename = "type")]
    pub constraint_type: String,
    pub artifact_version: String,
    pub status: ConstraintStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judged_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ConstraintState {
    pub fn new(
        constraint_type: impl Into<String>,
        artifact_version: impl Into<String>,
        status: ConstraintStatus,
    ) -> Self {
        Self {
            constraint_type: constraint_type.into(),
            artifact_version: artifact_version.into(),
            status,
            judged_by: None,
            judged_at: None,
            comment: None,
        }
    }

    /// Record who judged the constraint, stamped now.
    #[must_use]
    pub fn judged(mut self, by: impl Into<String>, comment: Option<String>) -> Self {
        self.judged_by = Some(by.into());
        self.judged_at = Some(Utc::now());
        self.comment = comment;
        self
    }
}

/// A constraint moved from one state to another in an environment.
///
/// The current state always belongs to the constraint's type, including
/// events read back from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawConstraintStateChanged")]
pub struct ConstraintStateChanged {
    environment: String,
    constraint: Constraint,
    previous_state: Option<ConstraintState>,
    current_state: ConstraintState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConstraintStateChanged {
    environment: String,
    constraint: Constraint,
    previous_state: Option<ConstraintState>,
    current_state: ConstraintState,
}

impl TryFrom<RawConstraintStateChanged> for ConstraintStateChanged {
    type Error = Error;

    fn try_from(raw: RawConstraintStateChanged) -> Result<Self> {
        Self::new(
            raw.environment,
            raw.constraint,
            raw.previous_state,
            raw.current_state,
        )
    }
}

impl ConstraintStateChanged {
    /// Create a state change event.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidEvent` if the current state belongs to a
    /// different constraint type than the constraint itself.
    pub fn new(
        environment: impl Into<String>,
        constraint: Constraint,
        previous_state: Option<ConstraintState>,
        current_state: ConstraintState,
    ) -> Result<Self> {
        if current_state.constraint_type != constraint.constraint_type {
            return Err(Error::invalid_event(format!(
                "state of type '{}' does not match constraint of type '{}'",
                current_state.constraint_type, constraint.constraint_type
            )));
        }
        Ok(Self {
            environment: environment.into(),
            constraint,
            previous_state,
            current_state,
        })
    }

    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    #[must_use]
    pub const fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    #[must_use]
    pub const fn previous_state(&self) -> Option<&ConstraintState> {
        self.previous_state.as_ref()
    }

    #[must_use]
    pub const fn current_state(&self) -> &ConstraintState {
        &self.current_state
    }

    /// The type used to route this event.
    #[must_use]
    pub fn constraint_type(&self) -> &str {
        &self.constraint.constraint_type
    }

    /// Whether the status actually changed.
    #[must_use]
    pub fn status_changed(&self) -> bool {
        self.previous_state
            .as_ref()
            .is_none_or(|previous| previous.status != self.current_state.status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn judgement(status: ConstraintStatus) -> ConstraintState {
        ConstraintState::new("manual-judgement", "fnord-1.0.0", status)
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&ConstraintStatus::OverridePass).unwrap();
        assert_eq!(json, "\"OVERRIDE_PASS\"");
        assert_eq!(ConstraintStatus::OverrideFail.to_string(), "OVERRIDE_FAIL");
    }

    #[test]
    fn overrides_count_as_pass_or_fail() {
        assert!(ConstraintStatus::OverridePass.passes());
        assert!(ConstraintStatus::OverrideFail.fails());
        assert!(!ConstraintStatus::Pending.passes());
        assert!(!ConstraintStatus::Pending.fails());
        assert!(ConstraintStatus::OverridePass.is_override());
        assert!(!ConstraintStatus::Pass.is_override());
    }

    #[test]
    fn constraint_type_is_flattened_with_attributes() {
        let constraint = Constraint::new("depends-on").with_attribute("environment", json!("test"));

        let value = serde_json::to_value(&constraint).unwrap();

        assert_eq!(value, json!({"type": "depends-on", "environment": "test"}));
        let back: Constraint = serde_json::from_value(value).unwrap();
        assert_eq!(back, constraint);
    }

    #[test]
    fn mismatched_state_type_is_rejected() {
        let result = ConstraintStateChanged::new(
            "prod",
            Constraint::new("canary"),
            None,
            judgement(ConstraintStatus::Pending),
        );

        assert!(matches!(result, Err(Error::InvalidEvent { .. })));
    }

    #[test]
    fn deserializing_checks_state_type() {
        let event = ConstraintStateChanged::new(
            "prod",
            Constraint::new("manual-judgement"),
            None,
            judgement(ConstraintStatus::Pass),
        )
        .unwrap();
        let mut value = serde_json::to_value(&event).unwrap();
        let back: ConstraintStateChanged = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(back, event);

        value["currentState"]["type"] = json!("canary");
        let err = serde_json::from_value::<ConstraintStateChanged>(value).unwrap_err();
        assert!(err.to_string().contains("does not match constraint"));
    }

    #[test]
    fn status_changed_compares_previous_state() {
        let fresh = ConstraintStateChanged::new(
            "prod",
            Constraint::new("manual-judgement"),
            None,
            judgement(ConstraintStatus::Pending),
        )
        .unwrap();
        assert!(fresh.status_changed());

        let same = ConstraintStateChanged::new(
            "prod",
            Constraint::new("manual-judgement"),
            Some(judgement(ConstraintStatus::Pending)),
            judgement(ConstraintStatus::Pending),
        )
        .unwrap();
        assert!(!same.status_changed());
    }

    #[test]
    fn judged_state_records_judge() {
        let state = judgement(ConstraintStatus::OverridePass)
            .judged("emburns@netflix.com", Some("looks fine".to_string()));

        assert_eq!(state.judged_by.as_deref(), Some("emburns@netflix.com"));
        assert!(state.judged_at.is_some());
        assert_eq!(state.comment.as_deref(), Some("looks fine"));
    }
}
