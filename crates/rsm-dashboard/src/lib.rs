//! # rsm-dashboard
//!
//! Web dashboard for the optimization workflow. A [`WorkflowController`]
//! owns the reported state and runs one workflow at a time; connected
//! WebSocket clients receive every event through the [`SubscriberRegistry`]
//! and may start or reset a run.

pub mod config;
pub mod controller;
pub mod registry;
pub mod routes;

pub use config::DashboardConfig;
pub use controller::{ControlError, ControlMessage, WorkflowController};
pub use registry::SubscriberRegistry;
pub use routes::router;
