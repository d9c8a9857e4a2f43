use anyhow::Context;
use tracing::info;

use rsm_dashboard::{router, DashboardConfig, WorkflowController};
use rsm_engine::build_runner;
use rsm_engine::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let config = DashboardConfig::from_env().context("invalid RSM_* configuration")?;
    let runner = build_runner(&config.engine).context("failed to set up tool transports")?;
    let app = router(WorkflowController::new(runner));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(addr = %config.addr, transport = ?config.engine.transport.kind, "RSM dashboard listening");
    axum::serve(listener, app).await?;

    Ok(())
}
