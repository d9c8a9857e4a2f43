//! Workflow phases and the progress events a run emits.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rsm_types::{
    DesignPoint, Observation, OptimizationResult, QuadraticModel, RefinementSummary,
    WorkflowSummary,
};

/// Phases of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    #[default]
    Idle,
    Doe,
    Modeling,
    Optimization,
    Refinement,
    Complete,
    Error,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::Doe => "doe",
            WorkflowPhase::Modeling => "modeling",
            WorkflowPhase::Optimization => "optimization",
            WorkflowPhase::Refinement => "refinement",
            WorkflowPhase::Complete => "complete",
            WorkflowPhase::Error => "error",
        }
    }

    /// Phases a run cannot leave on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowPhase::Complete | WorkflowPhase::Error)
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run reports while it progresses. Serialised with a `type`
/// discriminator for the dashboard push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    PhaseChange {
        phase: WorkflowPhase,
        message: String,
    },
    DoeGenerated {
        points: Vec<DesignPoint>,
        message: String,
    },
    DataCollection {
        phase: WorkflowPhase,
        point: DesignPoint,
        index: usize,
        total: usize,
        message: String,
    },
    DataCollected {
        phase: WorkflowPhase,
        observation: Observation,
        index: usize,
        total: usize,
        message: String,
    },
    ModelFitted {
        model: QuadraticModel,
        message: String,
    },
    OptimizationComplete {
        result: OptimizationResult,
        message: String,
    },
    RefinementComplete {
        observations: Vec<Observation>,
        summary: Option<RefinementSummary>,
        message: String,
    },
    WorkflowComplete {
        summary: WorkflowSummary,
        message: String,
    },
    Error {
        kind: String,
        message: String,
    },
    StateUpdate {
        state: Box<crate::snapshot::WorkflowSnapshot>,
        message: String,
    },
    ResetComplete {
        message: String,
    },
}

impl WorkflowEvent {
    pub fn message(&self) -> &str {
        match self {
            WorkflowEvent::PhaseChange { message, .. }
            | WorkflowEvent::DoeGenerated { message, .. }
            | WorkflowEvent::DataCollection { message, .. }
            | WorkflowEvent::DataCollected { message, .. }
            | WorkflowEvent::ModelFitted { message, .. }
            | WorkflowEvent::OptimizationComplete { message, .. }
            | WorkflowEvent::RefinementComplete { message, .. }
            | WorkflowEvent::WorkflowComplete { message, .. }
            | WorkflowEvent::Error { message, .. }
            | WorkflowEvent::StateUpdate { message, .. }
            | WorkflowEvent::ResetComplete { message } => message,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::PhaseChange { .. } => "phase_change",
            WorkflowEvent::DoeGenerated { .. } => "doe_generated",
            WorkflowEvent::DataCollection { .. } => "data_collection",
            WorkflowEvent::DataCollected { .. } => "data_collected",
            WorkflowEvent::ModelFitted { .. } => "model_fitted",
            WorkflowEvent::OptimizationComplete { .. } => "optimization_complete",
            WorkflowEvent::RefinementComplete { .. } => "refinement_complete",
            WorkflowEvent::WorkflowComplete { .. } => "workflow_complete",
            WorkflowEvent::Error { .. } => "error",
            WorkflowEvent::StateUpdate { .. } => "state_update",
            WorkflowEvent::ResetComplete { .. } => "reset_complete",
        }
    }

    /// An `error` event outside of any run, e.g. a rejected control message.
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        WorkflowEvent::Error {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

/// Receives every event a run emits, in order.
pub trait WorkflowObserver: Send + Sync {
    fn on_event(&self, event: &WorkflowEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl WorkflowObserver for NullObserver {
    fn on_event(&self, _event: &WorkflowEvent) {}
}

/// Observer that records events for later inspection.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Phases entered, in order.
    pub fn phases(&self) -> Vec<WorkflowPhase> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::PhaseChange { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect()
    }
}

impl WorkflowObserver for EventLog {
    fn on_event(&self, event: &WorkflowEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_carry_type_tag() {
        let event = WorkflowEvent::PhaseChange {
            phase: WorkflowPhase::Modeling,
            message: "Phase 2".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "phase_change");
        assert_eq!(value["phase"], "modeling");
        assert_eq!(event.event_type(), "phase_change");

        let reset = serde_json::to_value(WorkflowEvent::ResetComplete {
            message: "reset".into(),
        })
        .unwrap();
        assert_eq!(reset, json!({"type": "reset_complete", "message": "reset"}));
    }

    #[test]
    fn error_event_shape() {
        let value = serde_json::to_value(WorkflowEvent::error("workflow", "already running")).unwrap();
        assert_eq!(
            value,
            json!({"type": "error", "kind": "workflow", "message": "already running"})
        );
    }

    #[test]
    fn event_log_records_in_order() {
        let log = EventLog::new();
        assert!(log.is_empty());
        for phase in [WorkflowPhase::Doe, WorkflowPhase::Modeling] {
            log.on_event(&WorkflowEvent::PhaseChange {
                phase,
                message: phase.to_string(),
            });
        }
        log.on_event(&WorkflowEvent::error("fitting_failure", "boom"));
        assert_eq!(log.len(), 3);
        assert_eq!(log.phases(), vec![WorkflowPhase::Doe, WorkflowPhase::Modeling]);
        assert_eq!(log.events()[2].message(), "boom");
    }

    #[test]
    fn terminal_phases() {
        assert!(WorkflowPhase::Complete.is_terminal());
        assert!(WorkflowPhase::Error.is_terminal());
        assert!(!WorkflowPhase::Refinement.is_terminal());
        assert_eq!(WorkflowPhase::default(), WorkflowPhase::Idle);
    }
}
