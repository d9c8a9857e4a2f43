//! Fitted response-surface model and optimization results.

use serde::{Deserialize, Serialize};

use crate::design::{DesignPoint, Observation};

/// Number of coefficients in the quadratic response surface.
pub const NUM_COEFFICIENTS: usize = 6;

/// Symbolic form of the fitted surface.
pub const MODEL_EQUATION: &str = "y = a*x1² + b*x2² + c*x1*x2 + d*x1 + e*x2 + f";

/// Display names for the six coefficients, in coefficient order.
pub const COEFFICIENT_NAMES: [&str; NUM_COEFFICIENTS] = [
    "a (x1²)",
    "b (x2²)",
    "c (x1*x2)",
    "d (x1)",
    "e (x2)",
    "f (intercept)",
];

/// Evaluate `a·x1² + b·x2² + c·x1·x2 + d·x1 + e·x2 + f`.
pub fn evaluate_quadratic(coefficients: &[f64; NUM_COEFFICIENTS], point: &DesignPoint) -> f64 {
    let [a, b, c, d, e, f] = *coefficients;
    let (x1, x2) = (point.x1(), point.x2());
    a * x1 * x1 + b * x2 * x2 + c * x1 * x2 + d * x1 + e * x2 + f
}

/// Closed-form gradient `(2a·x1 + c·x2 + d, 2b·x2 + c·x1 + e)`.
pub fn quadratic_gradient(coefficients: &[f64; NUM_COEFFICIENTS], point: &DesignPoint) -> [f64; 2] {
    let [a, b, c, d, e, _] = *coefficients;
    let (x1, x2) = (point.x1(), point.x2());
    [2.0 * a * x1 + c * x2 + d, 2.0 * b * x2 + c * x1 + e]
}

/// A quadratic response surface fitted by least squares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticModel {
    /// Coefficients `[a, b, c, d, e, f]`.
    pub coefficients: [f64; NUM_COEFFICIENTS],
    /// Coefficient of determination of the fit.
    pub r_squared: f64,
    /// Number of observations used for the fit.
    pub num_data_points: usize,
}

impl QuadraticModel {
    pub fn predict(&self, point: &DesignPoint) -> f64 {
        evaluate_quadratic(&self.coefficients, point)
    }

    pub fn gradient(&self, point: &DesignPoint) -> [f64; 2] {
        quadratic_gradient(&self.coefficients, point)
    }

    pub fn equation(&self) -> &'static str {
        MODEL_EQUATION
    }

    pub fn coefficient_names(&self) -> [&'static str; NUM_COEFFICIENTS] {
        COEFFICIENT_NAMES
    }
}

/// Outcome of minimising a fitted surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub optimal_point: DesignPoint,
    pub optimal_value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Comparison between the model-predicted optimum and the best refinement
/// measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementSummary {
    pub best_point: Observation,
    pub predicted_value: f64,
    /// `|predicted_value - best_point.measurement|`
    pub prediction_gap: f64,
}

impl RefinementSummary {
    pub fn new(best_point: Observation, predicted_value: f64) -> Self {
        Self {
            best_point,
            predicted_value,
            prediction_gap: (predicted_value - best_point.measurement).abs(),
        }
    }
}

/// Final report of a completed workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub total_points: usize,
    pub r_squared: f64,
    pub predicted_optimum: DesignPoint,
    pub predicted_value: f64,
    pub experimental_optimum: Option<DesignPoint>,
    pub experimental_value: Option<f64>,
}
