//! Wire types for the tool-call interface.
//!
//! Parameters and results are plain JSON objects. Each operation has its own
//! parameter struct and response type so a reply is decoded exactly once, at
//! the client boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use rsm_optimizer::{DEFAULT_REFINEMENT_POINTS, DEFAULT_REFINEMENT_RADIUS};
use rsm_types::{
    Bounds, DesignPoint, Observation, OptimizationResult, QuadraticModel, COEFFICIENT_NAMES,
    MODEL_EQUATION, NUM_COEFFICIENTS,
};

pub const SUGGEST_DOE_POINTS: &str = "suggest_doe_points";
pub const FIT_RESPONSE_SURFACE: &str = "fit_response_surface";
pub const OPTIMIZE_FROM_MODEL: &str = "optimize_from_model";
pub const SUGGEST_REFINEMENT_POINTS: &str = "suggest_refinement_points";
pub const COLLECT_MEASUREMENT: &str = "collect_measurement";
/// Reserved request name answered by the stdio server loop itself.
pub const LIST_TOOLS: &str = "list_tools";

/// Description of a tool a server exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the parameter object.
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Errors a tool server reports instead of a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid parameters for {tool}: {message}")]
    InvalidParams { tool: String, message: String },
    #[error("tool {tool} failed: {message}")]
    Execution { tool: String, message: String },
}

/// Decode a parameter object for `tool`.
pub fn parse_params<T: serde::de::DeserializeOwned>(tool: &str, params: Value) -> Result<T, ToolError> {
    serde_json::from_value(params).map_err(|e| ToolError::InvalidParams {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoeParams {
    pub num_variables: usize,
    pub num_levels: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    pub data: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeParams {
    pub model_coefficients: [f64; NUM_COEFFICIENTS],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

fn default_refinement_points() -> usize {
    DEFAULT_REFINEMENT_POINTS
}

fn default_refinement_radius() -> f64 {
    DEFAULT_REFINEMENT_RADIUS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementParams {
    pub optimal_point: DesignPoint,
    #[serde(default = "default_refinement_points")]
    pub num_points: usize,
    #[serde(default = "default_refinement_radius")]
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementParams {
    pub design_variables: DesignPoint,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Successful `fit_response_surface` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub status: String,
    pub model_coefficients: [f64; NUM_COEFFICIENTS],
    pub r_squared: f64,
    pub num_data_points: usize,
    pub model_equation: String,
    pub coefficient_names: Vec<String>,
}

impl FitReport {
    pub fn from_model(model: &QuadraticModel) -> Self {
        Self {
            status: "Response Surface Model Fitted".to_string(),
            model_coefficients: model.coefficients,
            r_squared: model.r_squared,
            num_data_points: model.num_data_points,
            model_equation: MODEL_EQUATION.to_string(),
            coefficient_names: COEFFICIENT_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn to_model(&self) -> QuadraticModel {
        QuadraticModel {
            coefficients: self.model_coefficients,
            r_squared: self.r_squared,
            num_data_points: self.num_data_points,
        }
    }
}

/// `fit_response_surface` replies either with a fitted model or an in-band
/// error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FitResponse {
    Fitted(FitReport),
    Failed { error: String },
}

/// `optimize_from_model` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeReport {
    pub status: String,
    pub optimal_point: DesignPoint,
    pub optimal_value: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl From<OptimizationResult> for OptimizeReport {
    fn from(result: OptimizationResult) -> Self {
        Self {
            status: "Optimization Complete".to_string(),
            optimal_point: result.optimal_point,
            optimal_value: result.optimal_value,
            iterations: result.iterations,
            converged: result.converged,
        }
    }
}

impl From<OptimizeReport> for OptimizationResult {
    fn from(report: OptimizeReport) -> Self {
        Self {
            optimal_point: report.optimal_point,
            optimal_value: report.optimal_value,
            iterations: report.iterations,
            converged: report.converged,
        }
    }
}

// ---------------------------------------------------------------------------
// Line protocol frames
// ---------------------------------------------------------------------------

/// One request line on a stdio transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: u64,
    pub tool: String,
    #[serde(default)]
    pub params: Value,
}

/// One reply line on a stdio transport. Exactly one of `result` and `error`
/// is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReply {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolReply {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn refinement_params_use_defaults() {
        let params: RefinementParams =
            parse_params(SUGGEST_REFINEMENT_POINTS, json!({"optimal_point": [0.2, 0.4]})).unwrap();
        assert_eq!(params.num_points, 5);
        assert_eq!(params.radius, 0.1);
    }

    #[test]
    fn optimize_params_bounds_are_optional_and_validated() {
        let params: OptimizeParams = parse_params(
            OPTIMIZE_FROM_MODEL,
            json!({"model_coefficients": [1, 1, 0, 0, 0, 0]}),
        )
        .unwrap();
        assert!(params.bounds.is_none());

        let err = parse_params::<OptimizeParams>(
            OPTIMIZE_FROM_MODEL,
            json!({"model_coefficients": [1, 1, 0, 0, 0, 0], "bounds": [[1, 0], [0, 1]]}),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));

        assert!(parse_params::<OptimizeParams>(
            OPTIMIZE_FROM_MODEL,
            json!({"model_coefficients": [1, 1, 0]})
        )
        .is_err());
    }

    #[test]
    fn fit_response_decodes_both_shapes() {
        let failed: FitResponse =
            serde_json::from_str(r#"{"error": "Failed to fit the model"}"#).unwrap();
        assert!(matches!(failed, FitResponse::Failed { .. }));

        let model = QuadraticModel {
            coefficients: [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            r_squared: 0.9,
            num_data_points: 16,
        };
        let text = serde_json::to_string(&FitResponse::Fitted(FitReport::from_model(&model))).unwrap();
        match serde_json::from_str::<FitResponse>(&text).unwrap() {
            FitResponse::Fitted(report) => {
                assert_eq!(report.to_model(), model);
                assert_eq!(report.coefficient_names.len(), 6);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn reply_frames_omit_empty_fields() {
        let ok = serde_json::to_value(ToolReply::success(3, json!(1.5))).unwrap();
        assert_eq!(ok, json!({"id": 3, "result": 1.5}));

        let err = serde_json::to_value(ToolReply::failure(4, "boom")).unwrap();
        assert_eq!(err, json!({"id": 4, "error": "boom"}));
    }
}
