//! # rsm-engine
//!
//! Tool-call plumbing and the phased optimization workflow.
//!
//! The optimization and measurement roles are exposed as [`ToolServer`]s.
//! A [`ToolTransport`] carries calls to them, either in-process or to a child
//! process over stdio, and typed clients decode each reply once. The
//! [`WorkflowRunner`] drives DoE, modeling, optimization and refinement
//! through those clients and reports progress to a [`WorkflowObserver`].

pub mod client;
pub mod config;
pub mod console;
pub mod events;
pub mod protocol;
pub mod server;
pub mod snapshot;
pub mod telemetry;
pub mod transport;
pub mod workflow;

use std::sync::Arc;

use tracing::info;

use rsm_measure::SimulatedResponse;
use rsm_types::RsmResult;

pub use client::{MeasurementClient, OptimizationClient};
pub use config::{EngineConfig, TransportConfig, TransportKind, WorkflowConfig};
pub use console::ConsoleReporter;
pub use events::{EventLog, NullObserver, WorkflowEvent, WorkflowObserver, WorkflowPhase};
pub use server::{MeasurementServer, OptimizationServer, ToolServer};
pub use snapshot::WorkflowSnapshot;
pub use transport::{serve_stdio, InProcessTransport, StdioTransport, ToolTransport};
pub use workflow::{WorkflowFailure, WorkflowMachine, WorkflowReport, WorkflowRunner};

/// Build both clients on the transport `config` selects.
pub fn connect_clients(config: &EngineConfig) -> RsmResult<(OptimizationClient, MeasurementClient)> {
    let (optimization, measurement): (Arc<dyn ToolTransport>, Arc<dyn ToolTransport>) =
        match config.transport.kind {
            TransportKind::InProcess => {
                let source = SimulatedResponse::new(&config.measurement)?;
                (
                    Arc::new(InProcessTransport::new(OptimizationServer::new())),
                    Arc::new(InProcessTransport::new(MeasurementServer::new(source))),
                )
            }
            TransportKind::Stdio => (
                Arc::new(StdioTransport::from_command_line(
                    &config.transport.optimization_server,
                )?),
                Arc::new(StdioTransport::from_command_line(
                    &config.transport.measurement_server,
                )?),
            ),
        };

    info!(
        optimization = %optimization.describe(),
        measurement = %measurement.describe(),
        "tool transports ready"
    );

    Ok((
        OptimizationClient::new(optimization),
        MeasurementClient::new(measurement),
    ))
}

/// Build a runner for `config`.
pub fn build_runner(config: &EngineConfig) -> RsmResult<WorkflowRunner> {
    config.validate()?;
    let (optimization, measurement) = connect_clients(config)?;
    Ok(WorkflowRunner::new(
        optimization,
        measurement,
        config.workflow.clone(),
    ))
}
