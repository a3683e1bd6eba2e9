//! Routing constraint state changes to evaluators.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::types::ConstraintStateChanged;

/// An evaluator that keeps state about the constraints it owns.
#[async_trait]
pub trait StatefulConstraintEvaluator: Send + Sync {
    /// Evaluator name, used in logs and reports.
    fn name(&self) -> &str;

    /// The constraint type this evaluator owns.
    fn supported_type(&self) -> &str;

    /// React to a state change of a constraint of the supported type.
    async fn on_constraint_state_changed(&self, event: &ConstraintStateChanged) -> Result<()>;
}

/// What happened when one event was routed.
#[derive(Debug, Default)]
pub struct RelayReport {
    /// Evaluators that handled the event successfully.
    pub delivered: Vec<String>,
    /// Evaluators that failed, with their error.
    pub failed: Vec<(String, Error)>,
}

impl RelayReport {
    /// Total evaluators the event was routed to.
    #[must_use]
    pub fn routed(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Immutable routing table from constraint type to evaluators.
///
/// Several evaluators may own the same type; each gets every matching event.
pub struct ConstraintRelay {
    evaluators: Vec<Arc<dyn StatefulConstraintEvaluator>>,
}

impl ConstraintRelay {
    #[must_use]
    pub fn new(evaluators: Vec<Arc<dyn StatefulConstraintEvaluator>>) -> Self {
        Self { evaluators }
    }

    /// Route an event to every evaluator that supports its type.
    ///
    /// Evaluators run concurrently. A failing evaluator is logged and
    /// reported but does not stop delivery to the others.
    pub async fn on_constraint_state_changed(&self, event: &ConstraintStateChanged) -> RelayReport {
        let targets: Vec<_> = self.evaluators_for(event.constraint_type()).collect();
        if targets.is_empty() {
            debug!(
                constraint_type = event.constraint_type(),
                environment = event.environment(),
                "No evaluator for constraint type"
            );
            return RelayReport::default();
        }

        let results = join_all(targets.iter().map(|evaluator| async move {
            let outcome = evaluator.on_constraint_state_changed(event).await;
            (evaluator.name().to_string(), outcome)
        }))
        .await;

        let mut report = RelayReport::default();
        for (name, outcome) in results {
            match outcome {
                Ok(()) => report.delivered.push(name),
                Err(e) => {
                    error!(
                        evaluator = %name,
                        constraint_type = event.constraint_type(),
                        environment = event.environment(),
                        error = %e,
                        "Constraint evaluator failed"
                    );
                    report.failed.push((name, e));
                }
            }
        }
        report
    }

    /// Evaluators that own `constraint_type`, in registration order.
    pub fn evaluators_for<'a>(
        &'a self,
        constraint_type: &'a str,
    ) -> impl Iterator<Item = &'a Arc<dyn StatefulConstraintEvaluator>> + 'a {
        self.evaluators
            .iter()
            .filter(move |e| e.supported_type() == constraint_type)
    }

    /// Every constraint type with at least one evaluator.
    #[must_use]
    pub fn supported_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.evaluators.iter().map(|e| e.supported_type()).collect();
        types.sort_unstable();
        types.dedup();
        types
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl std::fmt::Debug for ConstraintRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintRelay")
            .field("supported_types", &self.supported_types())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl StatefulConstraintEvaluator for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn supported_type(&self) -> &str {
            self.1
        }

        async fn on_constraint_state_changed(&self, _: &ConstraintStateChanged) -> Result<()> {
            Ok(())
        }
    }

    fn relay() -> ConstraintRelay {
        ConstraintRelay::new(vec![
            Arc::new(Named("judge", "manual-judgement")),
            Arc::new(Named("canary", "canary")),
            Arc::new(Named("audit", "manual-judgement")),
        ])
    }

    #[test]
    fn evaluators_for_filters_by_type_in_order() {
        let relay = relay();

        let names: Vec<&str> = relay
            .evaluators_for("manual-judgement")
            .map(|e| e.name())
            .collect();

        assert_eq!(names, vec!["judge", "audit"]);
        assert_eq!(relay.evaluators_for("pipeline").count(), 0);
    }

    #[test]
    fn supported_types_are_sorted_and_unique() {
        assert_eq!(relay().supported_types(), vec!["canary", "manual-judgement"]);
        assert_eq!(relay().len(), 3);
        assert!(ConstraintRelay::new(Vec::new()).is_empty());
    }
}
