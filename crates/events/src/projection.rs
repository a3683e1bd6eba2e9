//! Projections: views folded from an entity's event history.

use async_trait::async_trait;
use converge_core::EntityKey;

use crate::error::Result;
use crate::event::StatusEvent;
use crate::store::EventLog;

/// Trait for projections (derived views).
///
/// A projection is a left fold over history. It holds no running state of
/// its own, so it can be recomputed from the log at any time.
#[async_trait]
pub trait Projection: Send + Sync {
    /// The state type this projection produces.
    type State: Send + Sync + Clone;

    /// Get the initial state.
    fn initial_state(&self) -> Self::State;

    /// Apply an event to the state.
    fn apply(&self, state: &mut Self::State, event: &StatusEvent);

    /// Fold a history, oldest first.
    fn fold(&self, events: &[StatusEvent]) -> Self::State {
        events.iter().fold(self.initial_state(), |mut state, event| {
            self.apply(&mut state, event);
            state
        })
    }

    /// Rebuild the state for one entity from a log.
    async fn rebuild(&self, log: &dyn EventLog, entity: &EntityKey) -> Result<Self::State> {
        let events = log.history(entity).await?;
        Ok(self.fold(&events))
    }
}
