//! Plain-text progress report for the command-line workflow.

use std::io::Write;

use parking_lot::Mutex;

use crate::events::{WorkflowEvent, WorkflowObserver, WorkflowPhase};
use crate::workflow::WorkflowReport;

const RULE_WIDTH: usize = 50;

/// Prints the banner report of a run to any writer (stdout by default).
pub struct ConsoleReporter<W: Write + Send = std::io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn lines(&self, lines: &[String]) {
        let mut out = self.out.lock();
        for line in lines {
            // A closed stdout is not worth aborting a run over.
            let _ = writeln!(out, "{line}");
        }
        let _ = out.flush();
    }

    pub fn print_header(&self) {
        let rule = "=".repeat(RULE_WIDTH);
        self.lines(&[
            rule.clone(),
            "   ENGINEERING OPTIMIZATION WORKFLOW".to_string(),
            rule,
        ]);
    }

    /// Final summary block. Failed runs print their cause instead.
    pub fn print_report(&self, report: &WorkflowReport) {
        let rule = "=".repeat(RULE_WIDTH);
        if let Some(failure) = &report.failure {
            self.lines(&[format!(
                "\nWorkflow stopped during {} ({}): {}",
                failure.phase, failure.kind, failure.message
            )]);
            return;
        }
        let Some(summary) = &report.summary else {
            return;
        };

        let mut lines = vec![
            format!("\n{rule}"),
            "   OPTIMIZATION WORKFLOW COMPLETE".to_string(),
            rule.clone(),
            format!("Total data points collected: {}", summary.total_points),
            format!("Response surface R²: {:.4}", summary.r_squared),
            format!("Model-predicted optimum: {}", summary.predicted_optimum),
            format!("Model-predicted value: {:.4}", summary.predicted_value),
        ];
        if let (Some(point), Some(value)) = (summary.experimental_optimum, summary.experimental_value) {
            lines.push(format!("Experimentally verified optimum: {point}"));
            lines.push(format!("Experimentally verified value: {value:.4}"));
        }
        lines.push(rule);
        self.lines(&lines);
    }
}

impl<W: Write + Send> WorkflowObserver for ConsoleReporter<W> {
    fn on_event(&self, event: &WorkflowEvent) {
        let dashes = "-".repeat(RULE_WIDTH);
        match event {
            WorkflowEvent::PhaseChange { phase, message } => {
                let title = match phase {
                    WorkflowPhase::Doe => "PHASE 1: Design of Experiments - Exploring Design Space",
                    WorkflowPhase::Modeling => "PHASE 2: Response Surface Modeling",
                    WorkflowPhase::Optimization => "PHASE 3: Model-Based Optimization",
                    WorkflowPhase::Refinement => "PHASE 4: Local Refinement Around Predicted Optimum",
                    _ => message.as_str(),
                };
                self.lines(&[format!("\n{title}"), dashes]);
            }
            WorkflowEvent::DoeGenerated { points, .. } => {
                self.lines(&[
                    format!("Generated {} DoE points for initial exploration", points.len()),
                    "Collecting experimental data...".to_string(),
                ]);
            }
            WorkflowEvent::DataCollection {
                point, index, total, ..
            } => {
                self.lines(&[format!("  Collecting data at point {index}/{total}: {point}")]);
            }
            WorkflowEvent::DataCollected {
                phase: WorkflowPhase::Doe,
                index,
                total,
                ..
            } if index == total => {
                self.lines(&[format!("Collected {total} data points from DoE phase")]);
            }
            WorkflowEvent::ModelFitted { model, .. } => {
                self.lines(&[
                    "Response Surface Model Fitted:".to_string(),
                    format!("  R² = {:.4}", model.r_squared),
                    format!("  Model: {}", model.equation()),
                ]);
            }
            WorkflowEvent::OptimizationComplete { result, .. } => {
                self.lines(&[
                    format!("Predicted optimal point: {}", result.optimal_point),
                    format!("Predicted optimal value: {:.4}", result.optimal_value),
                ]);
            }
            WorkflowEvent::RefinementComplete { summary, message, .. } => match summary {
                Some(s) => self.lines(&[
                    format!("Best refinement point: {}", s.best_point.vars),
                    format!("Best measured value: {:.4}", s.best_point.measurement),
                    format!("Prediction accuracy: {:.4}", s.prediction_gap),
                ]),
                None => self.lines(&[message.clone()]),
            },
            WorkflowEvent::Error { message, .. } => {
                self.lines(&[message.clone()]);
            }
            _ => {}
        }
    }
}
