//! Owns the dashboard's workflow state and runs the workflow on request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use rsm_engine::{
    WorkflowEvent, WorkflowObserver, WorkflowReport, WorkflowRunner, WorkflowSnapshot,
};

use crate::registry::SubscriberRegistry;

/// Control messages accepted on the push channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlMessage {
    StartOptimization,
    Reset,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("Optimization already running")]
    AlreadyRunning,
    #[error("Cannot reset while an optimization is running")]
    ResetWhileRunning,
    #[error("Invalid control message: {0}")]
    Malformed(String),
}

/// Clears the running flag when dropped, including when the run panics.
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single owner of the reported workflow state.
///
/// Runs are started on a spawned task and at most one is in flight. Every
/// event the run emits is folded into the snapshot and then broadcast, under
/// the same lock, so a client that connects mid-run sees a snapshot followed
/// by exactly the events after it.
pub struct WorkflowController {
    runner: WorkflowRunner,
    state: RwLock<WorkflowSnapshot>,
    running: AtomicBool,
    registry: SubscriberRegistry,
}

impl WorkflowController {
    pub fn new(runner: WorkflowRunner) -> Arc<Self> {
        Arc::new(Self {
            runner,
            state: RwLock::new(WorkflowSnapshot::new()),
            running: AtomicBool::new(false),
            registry: SubscriberRegistry::new(),
        })
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.state.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Subscribe a new client. The first thing it receives is a
    /// `state_update` carrying the current snapshot.
    pub fn connect(&self) -> (Uuid, UnboundedReceiver<String>) {
        let state = self.state.read();
        let (id, rx) = self.registry.subscribe();
        self.registry.send_to(
            &id,
            &WorkflowEvent::StateUpdate {
                state: Box::new(state.clone()),
                message: "Current workflow state".to_string(),
            },
        );
        info!(client = %id, clients = self.registry.len(), "dashboard client connected");
        (id, rx)
    }

    pub fn disconnect(&self, id: &Uuid) {
        if self.registry.unsubscribe(id) {
            info!(client = %id, clients = self.registry.len(), "dashboard client disconnected");
        }
    }

    /// Start a run unless one is already in flight.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<WorkflowReport>, ControlError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ControlError::AlreadyRunning);
        }

        info!("starting optimization workflow");
        let controller = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _running = RunningFlag(&controller.running);
            let report = controller.runner.run(controller.as_ref()).await;
            info!(run_id = %report.run_id, phase = %report.phase, "optimization run finished");
            report
        }))
    }

    /// Clear the reported state. Refused while a run is active.
    pub fn reset(&self) -> Result<(), ControlError> {
        if self.is_running() {
            return Err(ControlError::ResetWhileRunning);
        }
        self.on_event(&WorkflowEvent::ResetComplete {
            message: "System reset successfully".to_string(),
        });
        info!("workflow state reset");
        Ok(())
    }

    /// Handle one control message from client `id`. Rejections are answered
    /// to that client only.
    pub fn handle_control(self: &Arc<Self>, id: &Uuid, text: &str) {
        let outcome = match serde_json::from_str::<ControlMessage>(text) {
            Ok(ControlMessage::StartOptimization) => self.start().map(|_| ()),
            Ok(ControlMessage::Reset) => self.reset(),
            Err(e) => {
                warn!(client = %id, error = %e, "malformed control message");
                Err(ControlError::Malformed(e.to_string()))
            }
        };

        if let Err(e) = outcome {
            self.registry
                .send_to(id, &WorkflowEvent::error("control", e.to_string()));
        }
    }
}

impl WorkflowObserver for WorkflowController {
    fn on_event(&self, event: &WorkflowEvent) {
        let mut state = self.state.write();
        state.apply(event);
        self.registry.broadcast(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsm_engine::{
        build_runner, EngineConfig, MeasurementClient, OptimizationClient, ToolTransport,
        WorkflowConfig, WorkflowPhase,
    };
    use rsm_types::RsmResult;
    use rsm_measure::MeasurementConfig;
    use tokio_test::{assert_err, assert_ok};

    fn controller() -> Arc<WorkflowController> {
        let mut config = EngineConfig::default();
        config.measurement = MeasurementConfig {
            noise_std: 0.0,
            seed: Some(3),
        };
        WorkflowController::new(build_runner(&config).unwrap())
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn new_clients_first_receive_the_snapshot() {
        let controller = controller();
        let (_, mut rx) = controller.connect();
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "state_update");
        assert_eq!(messages[0]["state"]["phase"], "idle");
    }

    #[tokio::test]
    async fn run_updates_state_and_broadcasts() {
        let controller = controller();
        let (_, mut rx) = controller.connect();

        let report = assert_ok!(controller.start()).await.unwrap();
        assert!(report.is_complete());
        assert!(!controller.is_running());

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, WorkflowPhase::Complete);
        assert_eq!(snapshot.data_points.len(), 16);

        let types: Vec<String> = drain(&mut rx)
            .iter()
            .map(|m| m["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types.first().map(String::as_str), Some("state_update"));
        assert_eq!(types.last().map(String::as_str), Some("workflow_complete"));
        assert_eq!(types.iter().filter(|t| *t == "data_collected").count(), 21);
    }

    #[tokio::test]
    async fn second_start_is_rejected_to_the_requester_only() {
        let controller = controller();
        let (requester, mut requester_rx) = controller.connect();
        let (_, mut other_rx) = controller.connect();
        drain(&mut requester_rx);
        drain(&mut other_rx);

        // The spawned run cannot make progress until this task yields.
        let handle = assert_ok!(controller.start());
        assert!(controller.is_running());
        assert_eq!(assert_err!(controller.start()), ControlError::AlreadyRunning);

        controller.handle_control(&requester, r#"{"action": "start_optimization"}"#);
        let answer = drain(&mut requester_rx);
        assert_eq!(answer.len(), 1);
        assert_eq!(answer[0]["type"], "error");
        assert_eq!(answer[0]["message"], "Optimization already running");
        assert!(drain(&mut other_rx).is_empty());

        handle.await.unwrap();
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn reset_is_refused_while_running_and_clears_afterwards() {
        let controller = controller();
        let (_, mut rx) = controller.connect();

        let handle = assert_ok!(controller.start());
        assert_eq!(controller.reset(), Err(ControlError::ResetWhileRunning));
        handle.await.unwrap();

        assert_ok!(controller.reset());
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, WorkflowPhase::Idle);
        assert!(snapshot.data_points.is_empty());
        assert!(snapshot.summary.is_none());

        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last["type"], "reset_complete");
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl ToolTransport for Panicking {
        async fn call(&self, tool: &str, _params: serde_json::Value) -> RsmResult<String> {
            panic!("tool server crashed during {tool}");
        }

        fn describe(&self) -> String {
            "panicking".to_string()
        }
    }

    #[tokio::test]
    async fn panicked_run_releases_the_running_flag() {
        let transport: Arc<dyn ToolTransport> = Arc::new(Panicking);
        let runner = WorkflowRunner::new(
            OptimizationClient::new(Arc::clone(&transport)),
            MeasurementClient::new(transport),
            WorkflowConfig::default(),
        );
        let controller = WorkflowController::new(runner);

        let join = assert_ok!(controller.start()).await;
        assert!(join.unwrap_err().is_panic());
        assert!(!controller.is_running());

        let join = assert_ok!(controller.start()).await;
        assert!(join.unwrap_err().is_panic());
    }

    #[tokio::test]
    async fn malformed_control_messages_are_answered_privately() {
        let controller = controller();
        let (client, mut client_rx) = controller.connect();
        let (_, mut other_rx) = controller.connect();
        drain(&mut client_rx);
        drain(&mut other_rx);

        controller.handle_control(&client, "not json");
        controller.handle_control(&client, r#"{"action": "self_destruct"}"#);

        let answers = drain(&mut client_rx);
        assert_eq!(answers.len(), 2);
        assert!(answers.iter().all(|a| a["type"] == "error"));
        assert!(drain(&mut other_rx).is_empty());
        assert!(!controller.is_running());
    }
}
