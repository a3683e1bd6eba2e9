//! Periodic check loop.

use std::sync::Arc;
use std::time::Duration;

use converge_core::{CheckConfig, ManagedEntity};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::runner::{BatchReport, CheckRunner};

/// Configuration for the check loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Interval between check cycles.
    pub interval: Duration,
    /// Maximum consecutive failed cycles before stopping.
    pub max_errors: usize,
    /// Whether to stop on first failed cycle.
    pub stop_on_error: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from(&CheckConfig::default())
    }
}

impl From<&CheckConfig> for LoopConfig {
    fn from(config: &CheckConfig) -> Self {
        Self {
            interval: config.interval(),
            max_errors: 10,
            stop_on_error: false,
        }
    }
}

/// Source of the entities to check each cycle.
#[async_trait::async_trait]
pub trait EntitySource: Send + Sync {
    /// Get the entities currently under management.
    async fn entities(&self) -> Result<Vec<ManagedEntity>>;
}

/// Simple in-memory entity source.
pub struct InMemoryEntitySource {
    entities: tokio::sync::RwLock<Vec<ManagedEntity>>,
}

impl InMemoryEntitySource {
    /// Create a new source with initial entities.
    #[must_use]
    pub fn new(entities: Vec<ManagedEntity>) -> Self {
        Self {
            entities: tokio::sync::RwLock::new(entities),
        }
    }

    /// Replace the managed entities.
    pub async fn update(&self, entities: Vec<ManagedEntity>) {
        *self.entities.write().await = entities;
    }

    /// Modify the managed entities in place.
    pub async fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<ManagedEntity>),
    {
        let mut entities = self.entities.write().await;
        f(&mut entities);
    }
}

#[async_trait::async_trait]
impl EntitySource for InMemoryEntitySource {
    async fn entities(&self) -> Result<Vec<ManagedEntity>> {
        Ok(self.entities.read().await.clone())
    }
}

/// Periodically checks every managed entity.
///
/// A cycle fails only when the entity source cannot be read; individual
/// check failures are reported in the cycle's [`BatchReport`].
pub struct CheckLoop {
    runner: Arc<CheckRunner>,
    source: Arc<dyn EntitySource>,
    config: LoopConfig,
    stop_rx: watch::Receiver<bool>,
    stop_tx: watch::Sender<bool>,
}

impl CheckLoop {
    /// Create a new check loop.
    #[must_use]
    pub fn new(runner: Arc<CheckRunner>, source: Arc<dyn EntitySource>, config: LoopConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            runner,
            source,
            config,
            stop_rx,
            stop_tx,
        }
    }

    /// Run the check loop until stopped or max errors reached.
    ///
    /// # Errors
    ///
    /// Returns the failing cycle's error with `stop_on_error`, or
    /// `Error::LoopFailed` after `max_errors` consecutive failures.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            interval_ms = self.config.interval.as_millis(),
            "Starting check loop"
        );

        let mut consecutive_errors = 0usize;
        let mut interval = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.check_once().await {
                        Ok(report) => {
                            consecutive_errors = 0;
                            if report.converged() {
                                debug!(checked = report.completed.len(), "All entities converged");
                            }
                        }
                        Err(e) => {
                            consecutive_errors += 1;
                            error!(
                                error = %e,
                                consecutive = consecutive_errors,
                                "Check cycle error"
                            );

                            if self.config.stop_on_error {
                                return Err(e);
                            }

                            if consecutive_errors >= self.config.max_errors {
                                error!("Max errors reached, stopping loop");
                                return Err(Error::loop_failed(format!(
                                    "Max errors ({}) reached",
                                    self.config.max_errors
                                )));
                            }
                        }
                    }
                }
                _ = self.stop_rx.changed() => {
                    if *self.stop_rx.borrow() {
                        info!("Check loop stopped");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run a single check cycle.
    ///
    /// # Errors
    ///
    /// Returns the entity source's error.
    pub async fn check_once(&self) -> Result<BatchReport> {
        let entities = self.source.entities().await?;
        debug!(entities = entities.len(), "Running check cycle");
        Ok(self.runner.check_all(entities).await)
    }

    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Get a stopper handle.
    #[must_use]
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }
}

/// Handle to stop a check loop.
#[derive(Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
