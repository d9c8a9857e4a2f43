//! Tool servers for the optimization and measurement roles.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use rsm_measure::MeasurementSource;
use rsm_optimizer::{
    fit_response_surface, optimize_from_model, suggest_doe_points, suggest_refinement_points,
};

use crate::protocol::{
    parse_params, DoeParams, FitParams, FitReport, FitResponse, MeasurementParams,
    OptimizeParams, OptimizeReport, RefinementParams, ToolError, ToolSpec, COLLECT_MEASUREMENT,
    FIT_RESPONSE_SURFACE, OPTIMIZE_FROM_MODEL, SUGGEST_DOE_POINTS, SUGGEST_REFINEMENT_POINTS,
};

/// A named set of tools callable with a JSON parameter object.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Human-readable server name.
    fn name(&self) -> &str;

    /// Tools this server answers.
    fn tools(&self) -> Vec<ToolSpec>;

    /// Invoke `tool` with `params`.
    async fn call_tool(&self, tool: &str, params: Value) -> Result<Value, ToolError>;
}

fn to_json<T: Serialize>(tool: &str, value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Execution {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Optimization role
// ---------------------------------------------------------------------------

/// DoE generation, surface fitting, model optimization and refinement sampling.
#[derive(Debug, Clone, Default)]
pub struct OptimizationServer;

impl OptimizationServer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolServer for OptimizationServer {
    fn name(&self) -> &str {
        "Engineering_Optimization_Server"
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                SUGGEST_DOE_POINTS,
                "Generates a full factorial Design of Experiments over [0, 1].",
                json!({
                    "type": "object",
                    "properties": {
                        "num_variables": { "type": "integer", "minimum": 1 },
                        "num_levels": { "type": "integer", "minimum": 1 }
                    },
                    "required": ["num_variables", "num_levels"]
                }),
            ),
            ToolSpec::new(
                FIT_RESPONSE_SURFACE,
                "Fits a quadratic response surface to experimental data and reports \
                 the coefficients and goodness of fit.",
                json!({
                    "type": "object",
                    "properties": {
                        "data": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "vars": { "type": "array", "items": { "type": "number" }, "minItems": 2, "maxItems": 2 },
                                    "measurement": { "type": "number" }
                                },
                                "required": ["vars", "measurement"]
                            }
                        }
                    },
                    "required": ["data"]
                }),
            ),
            ToolSpec::new(
                OPTIMIZE_FROM_MODEL,
                "Finds the minimum of the fitted quadratic surface with projected \
                 gradient descent.",
                json!({
                    "type": "object",
                    "properties": {
                        "model_coefficients": { "type": "array", "items": { "type": "number" }, "minItems": 6, "maxItems": 6 },
                        "bounds": { "type": "array", "items": { "type": "array", "items": { "type": "number" } } }
                    },
                    "required": ["model_coefficients"]
                }),
            ),
            ToolSpec::new(
                SUGGEST_REFINEMENT_POINTS,
                "Suggests sampling points on a small circle around the predicted optimum.",
                json!({
                    "type": "object",
                    "properties": {
                        "optimal_point": { "type": "array", "items": { "type": "number" }, "minItems": 2, "maxItems": 2 },
                        "num_points": { "type": "integer", "default": 5 },
                        "radius": { "type": "number", "default": 0.1 }
                    },
                    "required": ["optimal_point"]
                }),
            ),
        ]
    }

    async fn call_tool(&self, tool: &str, params: Value) -> Result<Value, ToolError> {
        match tool {
            SUGGEST_DOE_POINTS => {
                let p: DoeParams = parse_params(tool, params)?;
                let points = suggest_doe_points(p.num_variables, p.num_levels).map_err(|e| {
                    ToolError::InvalidParams {
                        tool: tool.to_string(),
                        message: e.to_string(),
                    }
                })?;
                info!(points = points.len(), "suggested DoE points");
                to_json(tool, &points)
            }
            FIT_RESPONSE_SURFACE => {
                let p: FitParams = parse_params(tool, params)?;
                let response = match fit_response_surface(&p.data) {
                    Ok(model) => {
                        info!(r_squared = model.r_squared, points = model.num_data_points, "fitted response surface");
                        FitResponse::Fitted(FitReport::from_model(&model))
                    }
                    Err(e) => {
                        warn!(error = %e, "response surface fit failed");
                        FitResponse::Failed {
                            error: format!("Failed to fit the model. {e}"),
                        }
                    }
                };
                to_json(tool, &response)
            }
            OPTIMIZE_FROM_MODEL => {
                let p: OptimizeParams = parse_params(tool, params)?;
                let result = optimize_from_model(&p.model_coefficients, p.bounds.as_ref());
                info!(
                    iterations = result.iterations,
                    converged = result.converged,
                    "optimized fitted model"
                );
                to_json(tool, &OptimizeReport::from(result))
            }
            SUGGEST_REFINEMENT_POINTS => {
                let p: RefinementParams = parse_params(tool, params)?;
                if !p.radius.is_finite() || p.radius < 0.0 {
                    return Err(ToolError::InvalidParams {
                        tool: tool.to_string(),
                        message: format!("radius must be a finite non-negative number, got {}", p.radius),
                    });
                }
                let points = suggest_refinement_points(p.optimal_point, p.num_points, p.radius);
                to_json(tool, &points)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Measurement role
// ---------------------------------------------------------------------------

/// Serves `collect_measurement` from any [`MeasurementSource`].
#[derive(Debug)]
pub struct MeasurementServer<S: MeasurementSource> {
    source: S,
}

impl<S: MeasurementSource> MeasurementServer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<S: MeasurementSource> ToolServer for MeasurementServer<S> {
    fn name(&self) -> &str {
        "Data_Collection_Robot"
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new(
            COLLECT_MEASUREMENT,
            "Measures the performance of a design at the given design variables.",
            json!({
                "type": "object",
                "properties": {
                    "design_variables": { "type": "array", "items": { "type": "number" }, "minItems": 2, "maxItems": 2 }
                },
                "required": ["design_variables"]
            }),
        )]
    }

    async fn call_tool(&self, tool: &str, params: Value) -> Result<Value, ToolError> {
        match tool {
            COLLECT_MEASUREMENT => {
                let p: MeasurementParams = parse_params(tool, params)?;
                let value = self.source.measure(&p.design_variables);
                if !value.is_finite() {
                    return Err(ToolError::Execution {
                        tool: tool.to_string(),
                        message: format!("measurement at {} is not finite", p.design_variables),
                    });
                }
                Ok(json!(value))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
