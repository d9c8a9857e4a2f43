use rsm_engine::telemetry::init_tracing;
use rsm_engine::{serve_stdio, OptimizationServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");
    serve_stdio(&OptimizationServer::new()).await?;
    Ok(())
}
