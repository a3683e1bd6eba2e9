//! Dispatcher behavior across environments, frequencies and handlers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use converge_constraints::{Constraint, ConstraintState, ConstraintStateChanged, ConstraintStatus};
use converge_core::{
    DeliveryArtifact, DeliveryConfig, EntityKey, Environment, NotificationChannel,
    NotificationConfig, NotificationFrequency,
};
use converge_notifications::{
    ArtifactVersion, DeploymentStatus, Error, InMemoryDeliveryConfigRepository, LifecycleStatus,
    LifecycleType, MANUAL_JUDGEMENT, Notification, NotificationDispatcher, NotificationEvent,
    NotificationHandler, NotificationType, Result, ScmNotifier,
};

const APP: &str = "fnord";
const RELEASE: &str = "release";
const VERSION0: &str = "fnord-1.0.0-h0.a0a0a0a";

fn resource(env: &str) -> EntityKey {
    EntityKey::new("ec2/cluster@v1", APP, format!("fnord-{env}"))
}

fn delivery_config(test_is_preview: bool) -> DeliveryConfig {
    let mut test = Environment::new("test")
        .with_resource(resource("test"))
        .with_artifact(RELEASE)
        .with_notification(NotificationConfig::chat("test", NotificationFrequency::Normal));
    if test_is_preview {
        test = test.preview([("pullRequestId".to_string(), "42".to_string())]);
    }

    DeliveryConfig {
        name: format!("manifest_{APP}"),
        application: APP.to_string(),
        artifacts: vec![DeliveryArtifact {
            reference: RELEASE.to_string(),
            name: APP.to_string(),
            artifact_type: "deb".to_string(),
        }],
        environments: vec![
            test,
            Environment::new("staging")
                .with_resource(resource("staging"))
                .with_artifact(RELEASE)
                .with_notification(NotificationConfig::chat("staging", NotificationFrequency::Quiet)),
            Environment::new("production")
                .with_notification(NotificationConfig::chat("prod", NotificationFrequency::Verbose))
                .with_notification(NotificationConfig::chat("prod#2", NotificationFrequency::Quiet))
                .with_notification(NotificationConfig::email("@prod", NotificationFrequency::Verbose)),
        ],
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Sent {
    environment: String,
    address: String,
    kind: NotificationType,
}

struct RecordingHandler {
    name: &'static str,
    channel: NotificationChannel,
    types: Vec<NotificationType>,
    failing_address: Option<&'static str>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingHandler {
    fn chat(name: &'static str, types: &[NotificationType]) -> Arc<Self> {
        Arc::new(Self {
            name,
            channel: NotificationChannel::Chat,
            types: types.to_vec(),
            failing_address: None,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationHandler for RecordingHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn channel(&self) -> NotificationChannel {
        self.channel
    }

    fn supported_types(&self) -> &[NotificationType] {
        &self.types
    }

    async fn send_message(&self, notification: &Notification, address: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent {
            environment: notification.environment.clone(),
            address: address.to_string(),
            kind: notification.notification_type,
        });
        if self.failing_address == Some(address) {
            return Err(Error::delivery(address, "channel archived"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingScm {
    comments_rejected: bool,
    comments: Mutex<Vec<(String, String)>>,
    statuses: Mutex<Vec<(String, String, DeploymentStatus)>>,
}

#[async_trait]
impl ScmNotifier for RecordingScm {
    async fn comment_on_pull_request(
        &self,
        _config: &DeliveryConfig,
        environment: &Environment,
        comment: &str,
    ) -> Result<()> {
        self.comments
            .lock()
            .unwrap()
            .push((environment.name.clone(), comment.to_string()));
        if self.comments_rejected {
            return Err(Error::scm("comment", "pull request locked"));
        }
        Ok(())
    }

    async fn post_deployment_status(
        &self,
        _config: &DeliveryConfig,
        environment: &Environment,
        artifact: &ArtifactVersion,
        status: DeploymentStatus,
    ) -> Result<()> {
        self.statuses
            .lock()
            .unwrap()
            .push((environment.name.clone(), artifact.version.clone(), status));
        Ok(())
    }
}

struct Fixture {
    handler: Arc<RecordingHandler>,
    scm: Arc<RecordingScm>,
    dispatcher: NotificationDispatcher,
}

impl Fixture {
    fn new(handler: Arc<RecordingHandler>) -> Self {
        Self::with_config(handler, delivery_config(false))
    }

    fn with_config(handler: Arc<RecordingHandler>, config: DeliveryConfig) -> Self {
        Self::with_scm(handler, config, RecordingScm::default())
    }

    fn with_scm(handler: Arc<RecordingHandler>, config: DeliveryConfig, scm: RecordingScm) -> Self {
        let scm = Arc::new(scm);
        let dispatcher = NotificationDispatcher::builder()
            .with_repository(Arc::new(InMemoryDeliveryConfigRepository::new([config])))
            .with_handler(handler.clone())
            .with_scm_notifier(scm.clone())
            .with_base_url("https://deploy.example.com")
            .build()
            .unwrap();
        Self {
            handler,
            scm,
            dispatcher,
        }
    }
}

fn release(version: &str) -> ArtifactVersion {
    ArtifactVersion::new(RELEASE, version)
}

fn pinned(environment: &str) -> NotificationEvent {
    NotificationEvent::Pinned {
        application: APP.to_string(),
        environment: environment.to_string(),
        artifact: release(VERSION0),
        pinned_by: Some("ops@example.com".to_string()),
        comment: Some("comment".to_string()),
    }
}

fn deployed(environment: &str) -> NotificationEvent {
    NotificationEvent::ArtifactDeployed {
        application: APP.to_string(),
        environment: environment.to_string(),
        artifact: release(VERSION0),
    }
}

fn deploy_failed() -> NotificationEvent {
    NotificationEvent::ArtifactDeployFailed {
        application: APP.to_string(),
        resource: resource("test"),
        reference: RELEASE.to_string(),
        task_names: vec![format!(
            "Deploy {VERSION0} to server group waffletime-test in test/us-east-1"
        )],
    }
}

fn verification(environment: &str, status: ConstraintStatus) -> NotificationEvent {
    NotificationEvent::VerificationCompleted {
        delivery_config: format!("manifest_{APP}"),
        environment: environment.to_string(),
        artifact: release(VERSION0),
        status,
    }
}

/// Given production subscribed on two chat addresses and one email address
/// When an artifact is pinned there
/// Then the chat handler sends exactly one message per chat address
#[tokio::test]
async fn pin_notifies_each_chat_address_once() {
    let f = Fixture::new(RecordingHandler::chat("pins", &[NotificationType::ArtifactPinned]));

    let report = f.dispatcher.dispatch(&pinned("production")).await.unwrap();

    assert_eq!(report.sent, 2);
    let addresses: Vec<String> = f.handler.sent().into_iter().map(|s| s.address).collect();
    assert_eq!(addresses.len(), 2);
    assert!(addresses.contains(&"prod".to_string()));
    assert!(addresses.contains(&"prod#2".to_string()));
}

#[tokio::test]
async fn email_subscriptions_need_an_email_handler() {
    let chat = RecordingHandler::chat("pins", &[NotificationType::ArtifactPinned]);
    let email = Arc::new(RecordingHandler {
        name: "pin-email",
        channel: NotificationChannel::Email,
        types: vec![NotificationType::ArtifactPinned],
        failing_address: None,
        sent: Mutex::new(Vec::new()),
    });
    let dispatcher = NotificationDispatcher::builder()
        .with_repository(Arc::new(InMemoryDeliveryConfigRepository::new([delivery_config(false)])))
        .with_handler(chat.clone())
        .with_handler(email.clone())
        .build()
        .unwrap();

    let report = dispatcher.dispatch(&pinned("production")).await.unwrap();

    assert_eq!(report.sent, 3);
    assert_eq!(chat.count(), 2);
    assert_eq!(email.sent()[0].address, "@prod");
}

#[tokio::test]
async fn unknown_environment_sends_nothing() {
    let f = Fixture::new(RecordingHandler::chat("pins", &[NotificationType::ArtifactPinned]));

    let report = f.dispatcher.dispatch(&pinned("nope")).await.unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(f.handler.count(), 0);
}

#[tokio::test]
async fn event_without_handler_is_a_no_op() {
    let f = Fixture::new(RecordingHandler::chat("pins", &[NotificationType::ArtifactPinned]));

    let report = f.dispatcher.dispatch(&deployed("test")).await.unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(f.handler.count(), 0);
}

/// Given three environments with four chat subscriptions between them
/// When the application is paused
/// Then every chat subscription in every environment hears about it
#[tokio::test]
async fn pause_reaches_every_environment() {
    let f = Fixture::new(RecordingHandler::chat("paused", &[NotificationType::ApplicationPaused]));

    let report = f
        .dispatcher
        .dispatch(&NotificationEvent::ApplicationPaused {
            application: APP.to_string(),
            paused_by: Some("ops@example.com".to_string()),
            comment: None,
        })
        .await
        .unwrap();

    assert_eq!(report.sent, 4);
    let mut environments: Vec<String> = f.handler.sent().into_iter().map(|s| s.environment).collect();
    environments.sort();
    environments.dedup();
    assert_eq!(environments, vec!["production", "staging", "test"]);
}

/// Given a failed bake of an artifact deployed to test and staging only
/// When the lifecycle event arrives
/// Then only those two environments are notified
#[tokio::test]
async fn failed_bake_reaches_environments_using_the_artifact() {
    let f = Fixture::new(RecordingHandler::chat("lifecycle", &[NotificationType::LifecycleEvent]));
    let bake = |status| NotificationEvent::Lifecycle {
        delivery_config: format!("manifest_{APP}"),
        artifact: release(VERSION0),
        lifecycle_type: LifecycleType::Bake,
        status,
    };

    let report = f.dispatcher.dispatch(&bake(LifecycleStatus::Failed)).await.unwrap();
    assert_eq!(report.sent, 2);

    let report = f.dispatcher.dispatch(&bake(LifecycleStatus::Succeeded)).await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(f.handler.count(), 2);
}

#[tokio::test]
async fn deploy_success_notifies_normal_environment() {
    let f = Fixture::new(RecordingHandler::chat(
        "deploys",
        &[
            NotificationType::ArtifactDeploymentSucceeded,
            NotificationType::ArtifactDeploymentFailed,
        ],
    ));

    let report = f.dispatcher.dispatch(&deployed("test")).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(
        f.handler.sent(),
        vec![Sent {
            environment: "test".to_string(),
            address: "test".to_string(),
            kind: NotificationType::ArtifactDeploymentSucceeded,
        }]
    );
}

/// Given a quiet staging environment
/// When an artifact deploys successfully there
/// Then nothing is sent and the suppression is reported
#[tokio::test]
async fn deploy_success_is_suppressed_when_quiet() {
    let f = Fixture::new(RecordingHandler::chat(
        "deploys",
        &[NotificationType::ArtifactDeploymentSucceeded],
    ));

    let report = f.dispatcher.dispatch(&deployed("staging")).await.unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(report.suppressed, 1);
    assert_eq!(f.handler.count(), 0);
}

#[tokio::test]
async fn veto_notifies_every_production_chat_address() {
    let f = Fixture::new(RecordingHandler::chat(
        "deploys",
        &[NotificationType::ArtifactDeploymentFailed],
    ));

    let report = f
        .dispatcher
        .dispatch(&NotificationEvent::ArtifactVersionVetoed {
            application: APP.to_string(),
            environment: "production".to_string(),
            artifact: release(VERSION0),
        })
        .await
        .unwrap();

    assert_eq!(report.sent, 2);
    assert!(f.scm.statuses.lock().unwrap().is_empty());
}

/// Given a deploy task named by convention
/// When the task fails
/// Then the environment containing the resource is notified once
#[tokio::test]
async fn deploy_failure_notifies_resource_environment() {
    let f = Fixture::new(RecordingHandler::chat(
        "deploys",
        &[NotificationType::ArtifactDeploymentFailed],
    ));

    let report = f.dispatcher.dispatch(&deploy_failed()).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(f.handler.sent()[0].environment, "test");
}

#[tokio::test]
async fn deploy_failure_without_version_in_task_name_is_skipped() {
    let f = Fixture::new(RecordingHandler::chat(
        "deploys",
        &[NotificationType::ArtifactDeploymentFailed],
    ));
    let event = NotificationEvent::ArtifactDeployFailed {
        application: APP.to_string(),
        resource: resource("test"),
        reference: RELEASE.to_string(),
        task_names: vec!["Resize server group waffletime-test".to_string()],
    };

    let report = f.dispatcher.dispatch(&event).await.unwrap();

    assert_eq!(report.sent, 0);
    assert_eq!(f.handler.count(), 0);
}

/// Given a preview test environment
/// When an artifact deploys there
/// Then the pull request gets one comment and one successful deployment status
#[tokio::test]
async fn preview_deploy_success_is_reported_to_scm_once() {
    let f = Fixture::with_config(
        RecordingHandler::chat("deploys", &[NotificationType::ArtifactDeploymentSucceeded]),
        delivery_config(true),
    );

    f.dispatcher.dispatch(&deployed("test")).await.unwrap();

    let comments = f.scm.comments.lock().unwrap().clone();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].0, "test");
    assert!(comments[0].1.contains("fnord-test deployed to preview environment"));
    assert_eq!(
        *f.scm.statuses.lock().unwrap(),
        vec![("test".to_string(), VERSION0.to_string(), DeploymentStatus::Succeeded)]
    );
    assert_eq!(f.handler.count(), 1);
}

#[tokio::test]
async fn preview_deploy_failure_is_reported_to_scm_once() {
    let f = Fixture::with_config(
        RecordingHandler::chat("deploys", &[NotificationType::ArtifactDeploymentFailed]),
        delivery_config(true),
    );

    f.dispatcher.dispatch(&deploy_failed()).await.unwrap();

    let comments = f.scm.comments.lock().unwrap().clone();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].1.contains("Preview environment deployment failed"));
    assert_eq!(
        *f.scm.statuses.lock().unwrap(),
        vec![("test".to_string(), VERSION0.to_string(), DeploymentStatus::Failed)]
    );
}

#[tokio::test]
async fn non_preview_deploys_skip_scm() {
    let f = Fixture::new(RecordingHandler::chat(
        "deploys",
        &[NotificationType::ArtifactDeploymentSucceeded],
    ));

    f.dispatcher.dispatch(&deployed("test")).await.unwrap();

    assert!(f.scm.comments.lock().unwrap().is_empty());
    assert!(f.scm.statuses.lock().unwrap().is_empty());
}

#[tokio::test]
async fn verification_results_follow_frequency() {
    let f = Fixture::new(RecordingHandler::chat(
        "verifications",
        &[NotificationType::TestPassed, NotificationType::TestFailed],
    ));

    let failed = f
        .dispatcher
        .dispatch(&verification("staging", ConstraintStatus::Fail))
        .await
        .unwrap();
    let passed_quiet = f
        .dispatcher
        .dispatch(&verification("staging", ConstraintStatus::Pass))
        .await
        .unwrap();
    let passed_normal = f
        .dispatcher
        .dispatch(&verification("test", ConstraintStatus::Pass))
        .await
        .unwrap();
    let pending = f
        .dispatcher
        .dispatch(&verification("test", ConstraintStatus::Pending))
        .await
        .unwrap();

    assert_eq!(failed.sent, 1);
    assert_eq!(passed_quiet.sent, 0);
    assert_eq!(passed_normal.sent, 1);
    assert_eq!(pending.sent, 0);
}

/// Given an environment that lists the same address twice
/// When a notification is dispatched there
/// Then the address receives a single message
#[tokio::test]
async fn duplicate_addresses_in_an_environment_get_one_message() {
    let mut config = delivery_config(false);
    config.environments[0]
        .notifications
        .push(NotificationConfig::chat("test", NotificationFrequency::Verbose));
    let f = Fixture::with_config(
        RecordingHandler::chat("pins", &[NotificationType::ArtifactPinned]),
        config,
    );

    let report = f.dispatcher.dispatch(&pinned("test")).await.unwrap();

    assert_eq!(report.sent, 1);
}

/// Given one production address whose channel is archived
/// When a pin is dispatched
/// Then the other address still receives its message and the failure is returned
#[tokio::test]
async fn send_failures_are_returned_after_every_send() {
    let handler = Arc::new(RecordingHandler {
        name: "pins",
        channel: NotificationChannel::Chat,
        types: vec![NotificationType::ArtifactPinned],
        failing_address: Some("prod#2"),
        sent: Mutex::new(Vec::new()),
    });
    let f = Fixture::new(handler);

    let err = f.dispatcher.dispatch(&pinned("production")).await.unwrap_err();

    assert_eq!(f.handler.count(), 2);
    let failures = match err {
        Error::Send { failures } => failures,
        other => panic!("expected a send error, got {other}"),
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].address, "prod#2");
    assert_eq!(failures[0].environment, "production");
}

/// Given a preview environment whose chat channel is archived
/// And a pull request that rejects comments
/// When an artifact deploys there
/// Then the deployment status is still posted
/// And both failures come back in one send error
#[tokio::test]
async fn preview_scm_failures_are_returned_with_send_failures() {
    let handler = Arc::new(RecordingHandler {
        name: "deploys",
        channel: NotificationChannel::Chat,
        types: vec![NotificationType::ArtifactDeploymentSucceeded],
        failing_address: Some("test"),
        sent: Mutex::new(Vec::new()),
    });
    let scm = RecordingScm {
        comments_rejected: true,
        ..RecordingScm::default()
    };
    let f = Fixture::with_scm(handler, delivery_config(true), scm);

    let err = f.dispatcher.dispatch(&deployed("test")).await.unwrap_err();

    assert_eq!(f.handler.count(), 1);
    assert_eq!(f.scm.comments.lock().unwrap().len(), 1);
    assert_eq!(
        *f.scm.statuses.lock().unwrap(),
        vec![("test".to_string(), VERSION0.to_string(), DeploymentStatus::Succeeded)]
    );
    let failures = match err {
        Error::Send { failures } => failures,
        other => panic!("expected a send error, got {other}"),
    };
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].handler, "deploys");
    assert_eq!(failures[0].address, "test");
    assert_eq!(failures[1].handler, "scm");
    assert_eq!(failures[1].address, "pull_request_comment");
    assert_eq!(failures[1].environment, "test");
    assert!(failures[1].reason.contains("pull request locked"));
}

#[tokio::test]
async fn manual_judgment_awaiting_reaches_its_environment() {
    let f = Fixture::new(RecordingHandler::chat(
        "judgments",
        &[NotificationType::ManualJudgmentAwait],
    ));
    let change = ConstraintStateChanged::new(
        "production",
        Constraint::new(MANUAL_JUDGEMENT),
        None,
        ConstraintState::new(MANUAL_JUDGEMENT, VERSION0, ConstraintStatus::Pending),
    )
    .unwrap();
    let event = NotificationEvent::from_constraint_change(APP, RELEASE, &change).unwrap();

    let report = f.dispatcher.dispatch(&event).await.unwrap();

    assert_eq!(report.sent, 2);
    assert!(f.handler.sent().iter().all(|s| s.environment == "production"));
}

#[tokio::test]
async fn undeclared_artifact_is_skipped() {
    let f = Fixture::new(RecordingHandler::chat("pins", &[NotificationType::ArtifactPinned]));
    let event = NotificationEvent::Pinned {
        application: APP.to_string(),
        environment: "production".to_string(),
        artifact: ArtifactVersion::new("not-declared", VERSION0),
        pinned_by: None,
        comment: None,
    };

    let report = f.dispatcher.dispatch(&event).await.unwrap();

    assert_eq!(report.sent, 0);
}

#[tokio::test]
async fn unknown_application_is_skipped() {
    let f = Fixture::new(RecordingHandler::chat("paused", &[NotificationType::ApplicationPaused]));

    let report = f
        .dispatcher
        .dispatch(&NotificationEvent::ApplicationPaused {
            application: "other".to_string(),
            paused_by: None,
            comment: None,
        })
        .await
        .unwrap();

    assert_eq!(report.sent, 0);
}
