//! The phased optimization workflow.
//!
//! [`WorkflowMachine`] owns the phase and rejects illegal transitions.
//! [`WorkflowRunner`] drives a run through the two typed clients and reports
//! every step to a [`WorkflowObserver`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use rsm_types::{
    best_observation, DesignPoint, Observation, OptimizationResult, QuadraticModel,
    RefinementSummary, RsmError, RsmResult, WorkflowSummary,
};

use crate::client::{MeasurementClient, OptimizationClient};
use crate::config::WorkflowConfig;
use crate::events::{WorkflowEvent, WorkflowObserver, WorkflowPhase};

/// Explicit phase state machine.
///
/// Phases run `Idle → Doe → Modeling → Optimization → Refinement → Complete`.
/// `Error` can be entered from anywhere and never left.
#[derive(Debug, Clone, Default)]
pub struct WorkflowMachine {
    phase: WorkflowPhase,
}

impl WorkflowMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    /// Whether `from → to` is a legal forward transition.
    pub fn can_advance(from: WorkflowPhase, to: WorkflowPhase) -> bool {
        use WorkflowPhase::*;
        matches!(
            (from, to),
            (Idle, Doe)
                | (Doe, Modeling)
                | (Modeling, Optimization)
                | (Optimization, Refinement)
                | (Refinement, Complete)
        )
    }

    pub fn advance(&mut self, next: WorkflowPhase) -> RsmResult<WorkflowPhase> {
        if !Self::can_advance(self.phase, next) {
            return Err(RsmError::Workflow(format!(
                "illegal transition {} -> {next}",
                self.phase
            )));
        }
        self.phase = next;
        Ok(next)
    }

    /// Enter `Error`, returning the phase that failed.
    pub fn fail(&mut self) -> WorkflowPhase {
        std::mem::replace(&mut self.phase, WorkflowPhase::Error)
    }
}

/// Why a run ended in `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowFailure {
    /// Phase that was active when the run failed.
    pub phase: WorkflowPhase,
    /// Error taxonomy tag, e.g. `transport_failure`.
    pub kind: String,
    pub message: String,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phase: WorkflowPhase,
    pub doe_points: Vec<DesignPoint>,
    pub data: Vec<Observation>,
    pub model: Option<QuadraticModel>,
    pub optimization: Option<OptimizationResult>,
    pub refinement: Vec<Observation>,
    pub refinement_summary: Option<RefinementSummary>,
    pub summary: Option<WorkflowSummary>,
    pub failure: Option<WorkflowFailure>,
}

impl WorkflowReport {
    fn new(run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            started_at: now,
            finished_at: now,
            phase: WorkflowPhase::Idle,
            doe_points: Vec::new(),
            data: Vec::new(),
            model: None,
            optimization: None,
            refinement: Vec::new(),
            refinement_summary: None,
            summary: None,
            failure: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == WorkflowPhase::Complete
    }

    /// Every observation collected, DoE first.
    pub fn total_points(&self) -> usize {
        self.data.len() + self.refinement.len()
    }
}

/// Drives one workflow run at a time.
#[derive(Clone)]
pub struct WorkflowRunner {
    optimization: OptimizationClient,
    measurement: MeasurementClient,
    config: WorkflowConfig,
}

impl WorkflowRunner {
    pub fn new(
        optimization: OptimizationClient,
        measurement: MeasurementClient,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            optimization,
            measurement,
            config,
        }
    }

    /// Run the whole workflow. Failures end the run in `Error` and are
    /// recorded in the report rather than returned.
    pub async fn run(&self, observer: &dyn WorkflowObserver) -> WorkflowReport {
        let run_id = Uuid::new_v4();
        let mut machine = WorkflowMachine::new();
        let mut report = WorkflowReport::new(run_id);

        info!(run_id = %run_id, num_levels = self.config.num_levels, "starting optimization workflow");

        if let Err(e) = self.execute(&mut machine, &mut report, observer).await {
            let failed_in = machine.fail();
            error!(run_id = %run_id, phase = %failed_in, kind = e.kind(), error = %e, "optimization workflow failed");
            observer.on_event(&WorkflowEvent::Error {
                kind: e.kind().to_string(),
                message: format!("Optimization failed: {e}"),
            });
            report.failure = Some(WorkflowFailure {
                phase: failed_in,
                kind: e.kind().to_string(),
                message: e.to_string(),
            });
        } else {
            info!(run_id = %run_id, points = report.total_points(), "optimization workflow completed");
        }

        report.phase = machine.phase();
        report.finished_at = Utc::now();
        report
    }

    fn enter(
        machine: &mut WorkflowMachine,
        phase: WorkflowPhase,
        message: &str,
        observer: &dyn WorkflowObserver,
    ) -> RsmResult<()> {
        machine.advance(phase)?;
        info!(phase = %phase, "{message}");
        observer.on_event(&WorkflowEvent::PhaseChange {
            phase,
            message: message.to_string(),
        });
        Ok(())
    }

    async fn execute(
        &self,
        machine: &mut WorkflowMachine,
        report: &mut WorkflowReport,
        observer: &dyn WorkflowObserver,
    ) -> RsmResult<()> {
        // Phase 1: design of experiments.
        Self::enter(
            machine,
            WorkflowPhase::Doe,
            "Phase 1: Design of Experiments - Exploring Design Space",
            observer,
        )?;
        let points = self
            .optimization
            .suggest_doe_points(self.config.num_variables, self.config.num_levels)
            .await?;
        observer.on_event(&WorkflowEvent::DoeGenerated {
            points: points.clone(),
            message: format!("Generated {} DoE points", points.len()),
        });
        report.doe_points = points;

        report.data = self
            .collect(WorkflowPhase::Doe, &report.doe_points, observer)
            .await?;
        if report.data.is_empty() {
            return Err(RsmError::EmptyResult(
                "no experimental data collected".to_string(),
            ));
        }

        // Phase 2: response surface.
        Self::enter(
            machine,
            WorkflowPhase::Modeling,
            "Phase 2: Response Surface Modeling",
            observer,
        )?;
        let model = self.optimization.fit_response_surface(&report.data).await?;
        observer.on_event(&WorkflowEvent::ModelFitted {
            model: model.clone(),
            message: format!("Response Surface Model Fitted (R² = {:.4})", model.r_squared),
        });
        let coefficients = model.coefficients;
        let r_squared = model.r_squared;
        report.model = Some(model);

        // Phase 3: model-based optimization.
        Self::enter(
            machine,
            WorkflowPhase::Optimization,
            "Phase 3: Model-Based Optimization",
            observer,
        )?;
        let optimum = self
            .optimization
            .optimize_from_model(&coefficients, self.config.bounds.as_ref())
            .await?;
        observer.on_event(&WorkflowEvent::OptimizationComplete {
            result: optimum.clone(),
            message: format!("Predicted optimum found: {}", optimum.optimal_point),
        });
        report.optimization = Some(optimum.clone());

        // Phase 4: refinement around the predicted optimum.
        Self::enter(
            machine,
            WorkflowPhase::Refinement,
            "Phase 4: Local Refinement Around Predicted Optimum",
            observer,
        )?;
        let refinement_points = self
            .optimization
            .suggest_refinement_points(
                &optimum.optimal_point,
                self.config.refinement_points,
                self.config.refinement_radius,
            )
            .await?;
        report.refinement = if refinement_points.is_empty() {
            let degraded = RsmError::EmptyResult("no refinement points suggested".to_string());
            warn!(kind = degraded.kind(), "{degraded}");
            Vec::new()
        } else {
            self.collect(WorkflowPhase::Refinement, &refinement_points, observer)
                .await?
        };

        report.refinement_summary = best_observation(&report.refinement)
            .map(|best| RefinementSummary::new(*best, optimum.optimal_value));
        let message = match &report.refinement_summary {
            Some(s) => format!(
                "Best experimental point: {}, value: {:.4}",
                s.best_point.vars, s.best_point.measurement
            ),
            None => "No refinement data collected; skipping comparison".to_string(),
        };
        observer.on_event(&WorkflowEvent::RefinementComplete {
            observations: report.refinement.clone(),
            summary: report.refinement_summary.clone(),
            message,
        });

        // Done.
        machine.advance(WorkflowPhase::Complete)?;
        let summary = WorkflowSummary {
            total_points: report.total_points(),
            r_squared,
            predicted_optimum: optimum.optimal_point,
            predicted_value: optimum.optimal_value,
            experimental_optimum: report.refinement_summary.as_ref().map(|s| s.best_point.vars),
            experimental_value: report
                .refinement_summary
                .as_ref()
                .map(|s| s.best_point.measurement),
        };
        observer.on_event(&WorkflowEvent::WorkflowComplete {
            summary: summary.clone(),
            message: "Optimization workflow completed successfully!".to_string(),
        });
        report.summary = Some(summary);
        Ok(())
    }

    /// Measure every point in order. The first failed measurement aborts.
    async fn collect(
        &self,
        phase: WorkflowPhase,
        points: &[DesignPoint],
        observer: &dyn WorkflowObserver,
    ) -> RsmResult<Vec<Observation>> {
        let total = points.len();
        let mut observations = Vec::with_capacity(total);
        for (i, point) in points.iter().enumerate() {
            let index = i + 1;
            observer.on_event(&WorkflowEvent::DataCollection {
                phase,
                point: *point,
                index,
                total,
                message: format!("Collecting data at point {index}/{total}"),
            });

            let measurement = self.measurement.collect_measurement(point).await?;
            let observation = Observation::new(*point, measurement);
            observer.on_event(&WorkflowEvent::DataCollected {
                phase,
                observation,
                index,
                total,
                message: format!("Measured {measurement:.4} at {point}"),
            });
            observations.push(observation);
        }
        info!(phase = %phase, points = observations.len(), "data collection finished");
        Ok(observations)
    }
}
