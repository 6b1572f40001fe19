//! Agent library for host telemetry analysis
//!
//! This crate provides the core functionality for:
//! - Process inventory snapshots and sample construction
//! - Bounded, persisted sample history
//! - Baseline, trend, process and risk analysis
//! - Scheduled and on-demand analysis runs
//! - Report delivery, health checks and observability

pub mod analysis;
pub mod collector;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod policy;
pub mod scheduler;
pub mod sink;

pub use analysis::{AnalysisReport, Analyzer};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use policy::AnalysisPolicy;
