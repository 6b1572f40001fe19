//! Hostwatch Agent - host telemetry analysis agent
//!
//! Samples the local process inventory on a schedule, keeps a bounded
//! history, and reports baseline spikes, trends, new and suspicious
//! processes and an overall risk tier.

use agent_lib::{
    collector::SysinfoInventory,
    health::HealthRegistry,
    history::{HistoryStore, JsonFileLog},
    observability::{AgentMetrics, StructuredLogger},
    scheduler::{AnalysisScheduler, AnalysisService},
    sink::{JsonFileSink, LogSink},
};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting hostwatch-agent");

    let config = config::AgentConfig::load()?;
    let window = config.schedule_window()?;
    info!(
        host_name = %config.host_name,
        history_path = ?config.history_path,
        history_capacity = config.history_capacity,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let metrics = AgentMetrics::new();
    let logger = StructuredLogger::new(&config.host_name);

    let store = HistoryStore::new(
        Arc::new(JsonFileLog::new(&config.history_path)),
        config.history_capacity,
    );
    let mut service = AnalysisService::new(
        Arc::new(SysinfoInventory::new()),
        store,
        config.policy.clone(),
        health_registry.clone(),
        logger.clone(),
    )
    .with_sink(Arc::new(LogSink));
    if let Some(dir) = &config.report_dir {
        service = service.with_sink(Arc::new(JsonFileSink::new(dir)));
    }
    let service = Arc::new(service);

    logger.log_startup(AGENT_VERSION, service.history_len().await);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let scheduler = AnalysisScheduler::new(service.clone(), window);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(service.clone(), metrics));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    // History is loaded by now
    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());

    // A run in progress finishes before the scheduler returns
    match scheduler_handle.await {
        Ok(stats) => info!(runs = stats.runs, failures = stats.failures, "Scheduler stopped"),
        Err(e) => warn!(error = %e, "Scheduler task failed"),
    }
    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "API server exited with error"),
        Err(e) => warn!(error = %e, "API server task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}
