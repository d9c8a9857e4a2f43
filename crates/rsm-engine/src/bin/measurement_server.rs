use anyhow::Context;

use rsm_engine::telemetry::init_tracing;
use rsm_engine::{serve_stdio, EngineConfig, MeasurementServer};
use rsm_measure::SimulatedResponse;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let config = EngineConfig::from_env().context("invalid RSM_* configuration")?;
    let source = SimulatedResponse::new(&config.measurement)?;
    serve_stdio(&MeasurementServer::new(source)).await?;
    Ok(())
}
