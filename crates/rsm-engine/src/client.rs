//! Typed clients for the two tool roles.
//!
//! Each reply is decoded once into its response type here. Anything that does
//! not parse is a [`RsmError::MalformedResponse`] naming the tool.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use rsm_types::{
    Bounds, DesignPoint, Observation, OptimizationResult, QuadraticModel, RsmError, RsmResult,
    NUM_COEFFICIENTS,
};

use crate::protocol::{
    FitResponse, OptimizeReport, COLLECT_MEASUREMENT, FIT_RESPONSE_SURFACE, OPTIMIZE_FROM_MODEL,
    SUGGEST_DOE_POINTS, SUGGEST_REFINEMENT_POINTS,
};
use crate::transport::ToolTransport;

fn decode<T: DeserializeOwned>(tool: &str, text: &str) -> RsmResult<T> {
    serde_json::from_str(text).map_err(|e| RsmError::MalformedResponse {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Client for the optimization role.
#[derive(Clone)]
pub struct OptimizationClient {
    transport: Arc<dyn ToolTransport>,
}

impl OptimizationClient {
    pub fn new(transport: Arc<dyn ToolTransport>) -> Self {
        Self { transport }
    }

    pub async fn suggest_doe_points(
        &self,
        num_variables: usize,
        num_levels: usize,
    ) -> RsmResult<Vec<DesignPoint>> {
        let text = self
            .transport
            .call(
                SUGGEST_DOE_POINTS,
                json!({ "num_variables": num_variables, "num_levels": num_levels }),
            )
            .await?;
        let raw: Vec<Vec<f64>> = decode(SUGGEST_DOE_POINTS, &text)?;
        raw.into_iter()
            .map(|coords| {
                DesignPoint::try_from(coords).map_err(|e| RsmError::MalformedResponse {
                    tool: SUGGEST_DOE_POINTS.to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Fit the response surface. An in-band fitting error becomes
    /// [`RsmError::Fitting`].
    pub async fn fit_response_surface(&self, data: &[Observation]) -> RsmResult<QuadraticModel> {
        let text = self
            .transport
            .call(FIT_RESPONSE_SURFACE, json!({ "data": data }))
            .await?;
        match decode::<FitResponse>(FIT_RESPONSE_SURFACE, &text)? {
            FitResponse::Fitted(report) => Ok(report.to_model()),
            FitResponse::Failed { error } => Err(RsmError::Fitting(error)),
        }
    }

    pub async fn optimize_from_model(
        &self,
        coefficients: &[f64; NUM_COEFFICIENTS],
        bounds: Option<&Bounds>,
    ) -> RsmResult<OptimizationResult> {
        let mut params = json!({ "model_coefficients": coefficients });
        if let Some(bounds) = bounds {
            params["bounds"] = json!(bounds);
        }
        let text = self.transport.call(OPTIMIZE_FROM_MODEL, params).await?;
        let report: OptimizeReport = decode(OPTIMIZE_FROM_MODEL, &text)?;
        Ok(report.into())
    }

    pub async fn suggest_refinement_points(
        &self,
        optimal_point: &DesignPoint,
        num_points: usize,
        radius: f64,
    ) -> RsmResult<Vec<DesignPoint>> {
        let text = self
            .transport
            .call(
                SUGGEST_REFINEMENT_POINTS,
                json!({
                    "optimal_point": optimal_point,
                    "num_points": num_points,
                    "radius": radius,
                }),
            )
            .await?;
        decode(SUGGEST_REFINEMENT_POINTS, &text)
    }
}

/// Client for the measurement role.
#[derive(Clone)]
pub struct MeasurementClient {
    transport: Arc<dyn ToolTransport>,
}

impl MeasurementClient {
    pub fn new(transport: Arc<dyn ToolTransport>) -> Self {
        Self { transport }
    }

    pub async fn collect_measurement(&self, point: &DesignPoint) -> RsmResult<f64> {
        let text = self
            .transport
            .call(COLLECT_MEASUREMENT, json!({ "design_variables": point }))
            .await?;
        let value: f64 = decode(COLLECT_MEASUREMENT, &text)?;
        debug!(point = %point, value, "measurement received");
        Ok(value)
    }
}
