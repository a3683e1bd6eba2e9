//! Shared fakes for reconciler integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use converge_core::{CheckConfig, DesiredSpec, EntityKey, Error, ManagedEntity, ResourceKind};
use converge_diff::{Diff, DiffOptions};
use converge_events::{EventBus, InMemoryEventLog, StatusDeriver, StatusService};
use converge_reconciler::{
    ActuationPauser, Actuator, CheckRunner, InMemoryApplicationDirectory, OrchestrationRequest,
    ProcessorRegistry, Reconciler, ReconcilerBuilder, ResourceProcessor, TaskHandle,
};
use serde_json::{Value, json};
use tokio::sync::Notify;

pub const CLUSTER: &str = "ec2/cluster@v1";
pub const APP: &str = "fnord";

/// What the fake actuator reports for a resource.
#[derive(Debug, Clone)]
pub enum Script {
    Present(Value),
    Absent,
    Transport,
    Unresolvable,
    Hang,
    /// Signal `entered`, then wait for `release` before reporting absent.
    Gate,
}

#[derive(Default)]
pub struct FakeActuator {
    scripts: Mutex<HashMap<String, Script>>,
    pub get_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FakeActuator {
    pub fn script(&self, name: &str, script: Script) {
        self.scripts.lock().unwrap().insert(name.to_string(), script);
    }

    pub fn executes(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Actuator for FakeActuator {
    fn name(&self) -> &str {
        "fake-ec2"
    }

    async fn get_current(&self, spec: &DesiredSpec) -> converge_core::Result<Option<Value>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let name = spec.payload["name"].as_str().unwrap_or_default().to_string();
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .unwrap_or(Script::Absent);

        match script {
            Script::Present(value) => Ok(Some(value)),
            Script::Absent => Ok(None),
            Script::Transport => Err(Error::transport("ec2", "connection refused")),
            Script::Unresolvable => Err(Error::unresolvable("image not yet baked")),
            Script::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Ok(None)
            }
            Script::Gate => {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(None)
            }
        }
    }

    async fn execute(&self, request: &OrchestrationRequest) -> converge_core::Result<TaskHandle> {
        let n = self.execute_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TaskHandle::single(format!("task-{n}"), request.description.clone()))
    }
}

/// Handles clusters. Ignores server-assigned `id`; a `dependsOn` field names
/// a cluster that must already be known.
pub struct ClusterProcessor {
    pub known_upstreams: Vec<String>,
}

#[async_trait]
impl ResourceProcessor for ClusterProcessor {
    fn name(&self) -> &str {
        "cluster"
    }

    fn supports(&self, kind: &ResourceKind) -> bool {
        kind.as_str() == CLUSTER
    }

    fn diff_options(&self) -> DiffOptions {
        DiffOptions::new().ignore("id").list_key("/ports", "port")
    }

    fn desired(&self, entity: &ManagedEntity) -> converge_core::Result<Value> {
        match entity.spec.payload.get("capacity") {
            Some(capacity) if capacity["max"].as_u64() < capacity["min"].as_u64() => Err(
                Error::validation("capacity", "max must not be below min"),
            ),
            _ => Ok(entity.spec.payload.clone()),
        }
    }

    async fn check_preconditions(&self, entity: &ManagedEntity) -> converge_core::Result<()> {
        match entity.spec.payload["dependsOn"].as_str() {
            Some(upstream) if !self.known_upstreams.iter().any(|u| u == upstream) => {
                Err(Error::lookup("cluster", upstream))
            }
            _ => Ok(()),
        }
    }

    fn actions(
        &self,
        entity: &ManagedEntity,
        diff: &Diff,
        current_present: bool,
    ) -> converge_core::Result<Vec<OrchestrationRequest>> {
        let verb = if current_present { "Update" } else { "Create" };
        Ok(vec![OrchestrationRequest::new(
            entity.key.clone(),
            format!("{verb} cluster {}", entity.key.name),
            json!({"changes": diff.paths()}),
        )])
    }
}

pub fn key(name: &str) -> EntityKey {
    EntityKey::new(CLUSTER, APP, name)
}

pub fn cluster(name: &str) -> ManagedEntity {
    ManagedEntity::new(
        key(name),
        json!({
            "name": name,
            "capacity": {"min": 1, "max": 3},
            "ports": [{"port": 8080, "protocol": "tcp"}]
        }),
    )
    .unwrap()
}

pub fn cluster_with(name: &str, payload: Value) -> ManagedEntity {
    ManagedEntity::new(key(name), payload).unwrap()
}

pub struct Harness {
    pub actuator: Arc<FakeActuator>,
    pub applications: Arc<InMemoryApplicationDirectory>,
    pub reconciler: Arc<Reconciler>,
    pub bus: Arc<EventBus>,
    pub pauser: Arc<ActuationPauser>,
    pub runner: Arc<CheckRunner>,
    pub status: StatusService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timeout(5_000)
    }

    pub fn with_timeout(timeout_ms: u64) -> Self {
        let actuator = Arc::new(FakeActuator::default());
        let applications = Arc::new(InMemoryApplicationDirectory::new([APP]));
        let processor: Arc<dyn ResourceProcessor> = Arc::new(ClusterProcessor {
            known_upstreams: vec!["fnord-db".to_string()],
        });
        let registry = ProcessorRegistry::new(vec![processor], &[ResourceKind::new(CLUSTER)]).unwrap();
        let reconciler = Arc::new(
            ReconcilerBuilder::new()
                .with_registry(registry)
                .with_actuator(actuator.clone())
                .with_application_directory(applications.clone())
                .build()
                .unwrap(),
        );

        let log = InMemoryEventLog::new_arc();
        let bus = Arc::new(EventBus::new(log.clone()));
        let pauser = Arc::new(ActuationPauser::new(bus.clone()));
        let config = CheckConfig {
            timeout_ms,
            ..CheckConfig::default()
        };
        let runner = Arc::new(CheckRunner::new(
            reconciler.clone(),
            bus.clone(),
            pauser.clone(),
            &config,
        ));
        let status = StatusService::new(log, StatusDeriver::default());

        Self {
            actuator,
            applications,
            reconciler,
            bus,
            pauser,
            runner,
            status,
        }
    }

    pub async fn event_types(&self, name: &str) -> Vec<&'static str> {
        self.bus
            .log()
            .history(&key(name))
            .await
            .unwrap()
            .iter()
            .map(converge_events::StatusEvent::event_type)
            .collect()
    }
}
