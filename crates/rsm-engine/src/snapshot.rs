//! Reported state of a workflow run, folded from its events.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use rsm_types::{
    Observation, OptimizationResult, QuadraticModel, RefinementSummary, WorkflowSummary,
};

use crate::events::{WorkflowEvent, WorkflowPhase};

/// Number of event messages a snapshot keeps.
pub const MAX_MESSAGES: usize = 100;

/// What the dashboard shows and `/api/state` returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkflowSnapshot {
    pub phase: WorkflowPhase,
    /// Percentage of the current collection already measured.
    pub progress: f64,
    /// 1-based index of the point being measured.
    pub current_point: usize,
    /// Points in the current collection.
    pub total_points: usize,
    /// DoE observations.
    pub data_points: Vec<Observation>,
    pub model_results: Option<QuadraticModel>,
    pub optimization_results: Option<OptimizationResult>,
    pub refinement_results: Vec<Observation>,
    pub refinement_summary: Option<RefinementSummary>,
    pub summary: Option<WorkflowSummary>,
    pub error: Option<String>,
    pub messages: VecDeque<String>,
}

impl WorkflowSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the snapshot.
    pub fn apply(&mut self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::PhaseChange { phase, .. } => {
                if *phase == WorkflowPhase::Doe {
                    // A new run starts from a clean slate but keeps the log.
                    let messages = std::mem::take(&mut self.messages);
                    *self = Self {
                        messages,
                        ..Self::default()
                    };
                }
                self.phase = *phase;
            }
            WorkflowEvent::DoeGenerated { points, .. } => {
                self.total_points = points.len();
                self.current_point = 0;
                self.progress = 0.0;
            }
            WorkflowEvent::DataCollection { index, total, .. } => {
                self.current_point = *index;
                self.total_points = *total;
            }
            WorkflowEvent::DataCollected {
                phase,
                observation,
                index,
                total,
                ..
            } => {
                self.current_point = *index;
                self.total_points = *total;
                self.progress = if *total == 0 {
                    0.0
                } else {
                    100.0 * *index as f64 / *total as f64
                };
                match phase {
                    WorkflowPhase::Refinement => self.refinement_results.push(*observation),
                    _ => self.data_points.push(*observation),
                }
            }
            WorkflowEvent::ModelFitted { model, .. } => {
                self.model_results = Some(model.clone());
            }
            WorkflowEvent::OptimizationComplete { result, .. } => {
                self.optimization_results = Some(result.clone());
            }
            WorkflowEvent::RefinementComplete {
                observations,
                summary,
                ..
            } => {
                self.refinement_results = observations.clone();
                self.refinement_summary = summary.clone();
            }
            WorkflowEvent::WorkflowComplete { summary, .. } => {
                self.phase = WorkflowPhase::Complete;
                self.summary = Some(summary.clone());
            }
            WorkflowEvent::Error { message, .. } => {
                self.phase = WorkflowPhase::Error;
                self.error = Some(message.clone());
            }
            WorkflowEvent::StateUpdate { state, .. } => {
                *self = (**state).clone();
                return;
            }
            WorkflowEvent::ResetComplete { .. } => {
                *self = Self::default();
            }
        }
        self.push_message(event.message());
    }

    fn push_message(&mut self, message: &str) {
        if self.messages.len() == MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(message.to_string());
    }
}
