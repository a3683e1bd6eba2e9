//! Fan-out of delivery events to environment subscribers.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use converge_core::{DeliveryConfig, Environment};
use futures::future::join_all;
use regex::Regex;
use tracing::{debug, error, info};

use crate::error::{Error, Result, SendFailure};
use crate::event::{ConfigRef, Notification, NotificationEvent, Scope};
use crate::frequency::announces;
use crate::handler::{NotificationHandler, NotificationHandlers};
use crate::repository::DeliveryConfigRepository;
use crate::scm::{ScmNotifier, deployment_comment};
use crate::types::{ArtifactVersion, DeploymentStatus, NotificationType};

/// Deploy task names follow `Deploy <version> to <target>`.
pub const DEPLOY_TASK_PATTERN: &str = r"Deploy (.+?) to\b";

/// What one dispatch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Messages delivered.
    pub sent: usize,
    /// Subscriptions whose frequency filtered the event out.
    pub suppressed: usize,
}

/// Announces delivery events to the subscriptions of the affected environments.
///
/// Each environment is handled on its own: a subscription's frequency is
/// judged per environment, and an address subscribed more than once in one
/// environment receives a single message.
pub struct NotificationDispatcher {
    repository: Arc<dyn DeliveryConfigRepository>,
    handlers: NotificationHandlers,
    scm: Option<Arc<dyn ScmNotifier>>,
    base_url: String,
    deploy_task: Regex,
}

const SCM_HANDLER: &str = "scm";
const SCM_COMMENT: &str = "pull_request_comment";
const SCM_DEPLOYMENT_STATUS: &str = "deployment_status";

struct Outgoing {
    handler: Arc<dyn NotificationHandler>,
    notification: Notification,
    address: String,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Announce `event`.
    ///
    /// Events that are never announced, or whose delivery config, artifact
    /// or environment cannot be found, are skipped. Subscriptions without a
    /// handler for their channel are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Send` listing every failed message and every failed
    /// preview report once all of them were attempted, or the repository's
    /// error.
    pub async fn dispatch(&self, event: &NotificationEvent) -> Result<DispatchReport> {
        let Some(kind) = event.notification_type() else {
            debug!(event = ?event, "Event is not announced");
            return Ok(DispatchReport::default());
        };

        let Some(config) = self.resolve(event.config_ref()).await? else {
            debug!(config = ?event.config_ref(), %kind, "Delivery config not found, not notifying");
            return Ok(DispatchReport::default());
        };

        if let Some(reference) = event.artifact_reference() {
            if config.artifact(reference).is_none() {
                debug!(
                    application = %config.application,
                    reference,
                    "Artifact not declared in delivery config, not notifying"
                );
                return Ok(DispatchReport::default());
            }
        }

        let artifact = match event {
            NotificationEvent::ArtifactDeployFailed {
                reference,
                task_names,
                ..
            } => {
                let Some(version) = self.deployed_version(task_names) else {
                    debug!(tasks = ?task_names, "No version in deploy task name, not notifying");
                    return Ok(DispatchReport::default());
                };
                Some(ArtifactVersion::new(reference.clone(), version))
            }
            _ => event.artifact().cloned(),
        };

        let environments = target_environments(&config, event.scope());
        if environments.is_empty() {
            debug!(application = %config.application, %kind, "No target environment");
            return Ok(DispatchReport::default());
        }

        let mut report = DispatchReport::default();
        let outgoing = self.plan(&config, &environments, event, kind, artifact.as_ref(), &mut report);
        let mut failures = Self::send_all(&outgoing, &mut report).await;

        if let Some(artifact) = &artifact {
            let status = match event {
                NotificationEvent::ArtifactDeployed { .. } => Some(DeploymentStatus::Succeeded),
                NotificationEvent::ArtifactDeployFailed { .. } => Some(DeploymentStatus::Failed),
                _ => None,
            };
            if let Some(status) = status {
                for environment in environments.iter().filter(|e| e.is_preview) {
                    failures.extend(self.report_to_scm(&config, environment, artifact, status).await);
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::Send { failures });
        }
        info!(
            application = %config.application,
            %kind,
            sent = report.sent,
            suppressed = report.suppressed,
            "Notifications dispatched"
        );
        Ok(report)
    }

    async fn resolve(&self, config_ref: ConfigRef<'_>) -> Result<Option<DeliveryConfig>> {
        match config_ref {
            ConfigRef::Application(application) => {
                self.repository.get_for_application(application).await
            }
            ConfigRef::Name(name) => self.repository.get_by_name(name).await,
        }
    }

    fn deployed_version(&self, task_names: &[String]) -> Option<String> {
        let first = task_names.first()?;
        self.deploy_task
            .captures(first)?
            .get(1)
            .map(|m| m.as_str().to_string())
    }

    fn plan(
        &self,
        config: &DeliveryConfig,
        environments: &[&Environment],
        event: &NotificationEvent,
        kind: NotificationType,
        artifact: Option<&ArtifactVersion>,
        report: &mut DispatchReport,
    ) -> Vec<Outgoing> {
        let time = Utc::now();
        let mut outgoing = Vec::new();

        for environment in environments {
            let notification = Notification {
                notification_type: kind,
                application: config.application.clone(),
                environment: environment.name.clone(),
                artifact: artifact.cloned(),
                event: event.clone(),
                time,
            };
            let mut addressed = HashSet::new();

            for subscription in &environment.notifications {
                if !announces(subscription.frequency, kind) {
                    debug!(
                        environment = %environment.name,
                        address = %subscription.address,
                        frequency = ?subscription.frequency,
                        %kind,
                        "Notification suppressed by frequency"
                    );
                    report.suppressed += 1;
                    continue;
                }
                let Some(handler) = self.handlers.supporting(subscription.channel, kind) else {
                    debug!(
                        channel = ?subscription.channel,
                        %kind,
                        "No handler for notification, skipping"
                    );
                    continue;
                };
                if !addressed.insert((subscription.channel, subscription.address.as_str())) {
                    continue;
                }
                outgoing.push(Outgoing {
                    handler: Arc::clone(handler),
                    notification: notification.clone(),
                    address: subscription.address.clone(),
                });
            }
        }
        outgoing
    }

    async fn send_all(outgoing: &[Outgoing], report: &mut DispatchReport) -> Vec<SendFailure> {
        let results = join_all(outgoing.iter().map(|out| async move {
            let result = out.handler.send_message(&out.notification, &out.address).await;
            (out, result)
        }))
        .await;

        let mut failures = Vec::new();
        for (out, result) in results {
            match result {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    error!(
                        handler = out.handler.name(),
                        environment = %out.notification.environment,
                        address = %out.address,
                        error = %e,
                        "Failed to send notification"
                    );
                    failures.push(SendFailure {
                        handler: out.handler.name().to_string(),
                        environment: out.notification.environment.clone(),
                        address: out.address.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        failures
    }

    /// Comment on the pull request and post the deployment status. Both are
    /// attempted; each failure is returned alongside message failures.
    async fn report_to_scm(
        &self,
        config: &DeliveryConfig,
        environment: &Environment,
        artifact: &ArtifactVersion,
        status: DeploymentStatus,
    ) -> Vec<SendFailure> {
        let Some(scm) = &self.scm else {
            debug!(environment = %environment.name, "No SCM notifier, skipping preview report");
            return Vec::new();
        };
        let comment = deployment_comment(&self.base_url, config, environment, status);
        let results = [
            (
                SCM_COMMENT,
                scm.comment_on_pull_request(config, environment, &comment).await,
            ),
            (
                SCM_DEPLOYMENT_STATUS,
                scm.post_deployment_status(config, environment, artifact, status).await,
            ),
        ];

        let mut failures = Vec::new();
        for (address, result) in results {
            if let Err(e) = result {
                error!(
                    environment = %environment.name,
                    operation = address,
                    error = %e,
                    "Failed to report preview deployment"
                );
                failures.push(SendFailure {
                    handler: SCM_HANDLER.to_string(),
                    environment: environment.name.clone(),
                    address: address.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        failures
    }
}

fn target_environments<'a>(config: &'a DeliveryConfig, scope: Scope<'_>) -> Vec<&'a Environment> {
    match scope {
        Scope::Environment(name) => config.environment(name).into_iter().collect(),
        Scope::Resource(key) => config.environment_for(key).into_iter().collect(),
        Scope::Artifact(reference) => config
            .environments
            .iter()
            .filter(|e| e.uses_artifact(reference))
            .collect(),
        Scope::All => config.environments.iter().collect(),
    }
}

/// Builder for [`NotificationDispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    repository: Option<Arc<dyn DeliveryConfigRepository>>,
    handlers: Vec<Arc<dyn NotificationHandler>>,
    scm: Option<Arc<dyn ScmNotifier>>,
    base_url: Option<String>,
}

impl DispatcherBuilder {
    #[must_use]
    pub fn with_repository(mut self, repository: Arc<dyn DeliveryConfigRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Register a handler. Earlier handlers win when several match.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    #[must_use]
    pub fn with_scm_notifier(mut self, scm: Arc<dyn ScmNotifier>) -> Self {
        self.scm = Some(scm);
        self
    }

    /// Base URL of the UI, used for links in preview comments.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Build the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if no repository was given, or an SCM
    /// notifier was given without a base URL.
    pub fn build(self) -> Result<NotificationDispatcher> {
        let repository = self
            .repository
            .ok_or_else(|| Error::invalid_config("repository is required"))?;
        if self.scm.is_some() && self.base_url.is_none() {
            return Err(Error::invalid_config(
                "base URL is required for preview environment comments",
            ));
        }
        let deploy_task =
            Regex::new(DEPLOY_TASK_PATTERN).map_err(|e| Error::invalid_config(e.to_string()))?;

        Ok(NotificationDispatcher {
            repository,
            handlers: NotificationHandlers::new(self.handlers),
            scm: self.scm,
            base_url: self.base_url.unwrap_or_default(),
            deploy_task,
        })
    }
}
