//! Runtime configuration with environment overrides.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use rsm_measure::MeasurementConfig;
use rsm_optimizer::{DEFAULT_REFINEMENT_POINTS, DEFAULT_REFINEMENT_RADIUS};
use rsm_types::{Bounds, RsmError, RsmResult, NUM_VARIABLES};

/// Parameters of a single workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub num_variables: usize,
    pub num_levels: usize,
    pub refinement_points: usize,
    pub refinement_radius: f64,
    /// Optimizer bounds. `None` uses the unit square.
    pub bounds: Option<Bounds>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            num_variables: NUM_VARIABLES,
            num_levels: 4,
            refinement_points: DEFAULT_REFINEMENT_POINTS,
            refinement_radius: DEFAULT_REFINEMENT_RADIUS,
            bounds: None,
        }
    }
}

/// How the workflow reaches its tool servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    #[default]
    InProcess,
    Stdio,
}

impl FromStr for TransportKind {
    type Err = RsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-process" | "inprocess" | "local" => Ok(TransportKind::InProcess),
            "stdio" => Ok(TransportKind::Stdio),
            other => Err(RsmError::Config(format!(
                "unknown transport '{other}', expected 'in-process' or 'stdio'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// Command line of the optimization tool server (stdio only).
    pub optimization_server: String,
    /// Command line of the measurement tool server (stdio only).
    pub measurement_server: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::InProcess,
            optimization_server: "rsm-optimization-server".to_string(),
            measurement_server: "rsm-measurement-server".to_string(),
        }
    }
}

/// Everything the engine needs to run a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    pub workflow: WorkflowConfig,
    pub measurement: MeasurementConfig,
    pub transport: TransportConfig,
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> RsmResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| RsmError::Config(format!("{name}={raw:?}: {e}")))
}

impl EngineConfig {
    /// Defaults overridden by `RSM_*` environment variables.
    pub fn from_env() -> RsmResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `RSM_*` key.
    pub fn from_lookup<F>(lookup: F) -> RsmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("RSM_NUM_LEVELS") {
            config.workflow.num_levels = parse_var("RSM_NUM_LEVELS", &raw)?;
        }
        if let Some(raw) = lookup("RSM_REFINEMENT_POINTS") {
            config.workflow.refinement_points = parse_var("RSM_REFINEMENT_POINTS", &raw)?;
        }
        if let Some(raw) = lookup("RSM_REFINEMENT_RADIUS") {
            config.workflow.refinement_radius = parse_var("RSM_REFINEMENT_RADIUS", &raw)?;
        }
        if let Some(raw) = lookup("RSM_NOISE_STD") {
            config.measurement.noise_std = parse_var("RSM_NOISE_STD", &raw)?;
        }
        if let Some(raw) = lookup("RSM_SEED") {
            config.measurement.seed = Some(parse_var("RSM_SEED", &raw)?);
        }
        if let Some(raw) = lookup("RSM_TRANSPORT") {
            config.transport.kind = raw.parse()?;
        }
        if let Some(raw) = lookup("RSM_OPTIMIZATION_SERVER") {
            config.transport.optimization_server = raw;
        }
        if let Some(raw) = lookup("RSM_MEASUREMENT_SERVER") {
            config.transport.measurement_server = raw;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RsmResult<()> {
        let workflow = &self.workflow;
        if workflow.num_variables != NUM_VARIABLES {
            return Err(RsmError::Config(format!(
                "the quadratic model needs exactly {NUM_VARIABLES} variables, got {}",
                workflow.num_variables
            )));
        }
        if workflow.num_levels == 0 {
            return Err(RsmError::Config("num_levels must be at least 1".to_string()));
        }
        if !workflow.refinement_radius.is_finite() || workflow.refinement_radius < 0.0 {
            return Err(RsmError::Config(format!(
                "refinement_radius must be finite and non-negative, got {}",
                workflow.refinement_radius
            )));
        }
        if !self.measurement.noise_std.is_finite() || self.measurement.noise_std < 0.0 {
            return Err(RsmError::Config(format!(
                "noise_std must be finite and non-negative, got {}",
                self.measurement.noise_std
            )));
        }
        if self.transport.kind == TransportKind::Stdio
            && (self.transport.optimization_server.trim().is_empty()
                || self.transport.measurement_server.trim().is_empty())
        {
            return Err(RsmError::Config(
                "stdio transport needs both tool-server commands".to_string(),
            ));
        }
        Ok(())
    }
}
