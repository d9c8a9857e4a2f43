use anyhow::Context;

use rsm_engine::telemetry::init_tracing;
use rsm_engine::{build_runner, ConsoleReporter, EngineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("warn");

    let config = EngineConfig::from_env().context("invalid RSM_* configuration")?;
    let runner = build_runner(&config).context("failed to set up tool transports")?;

    let console = ConsoleReporter::stdout();
    console.print_header();
    let report = runner.run(&console).await;
    console.print_report(&report);

    if let Some(failure) = report.failure {
        anyhow::bail!("workflow failed during {}: {}", failure.phase, failure.message);
    }
    Ok(())
}
