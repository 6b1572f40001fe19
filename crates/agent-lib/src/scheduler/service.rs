//! Serialized analysis runs over the shared history
//!
//! Manual triggers and scheduled ticks both go through `run_once`, which
//! holds the history lock from snapshot to save.

use crate::analysis::{AnalysisReport, Analyzer};
use crate::collector::{InventoryError, ProcessInventory, SampleBuilder};
use crate::health::{components, HealthRegistry};
use crate::history::{History, HistoryStore};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::policy::AnalysisPolicy;
use crate::sink::ReportSink;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("history empty after append")]
    EmptyHistory,
}

/// Owns the history and runs the full analysis sequence against it
pub struct AnalysisService {
    inventory: Arc<dyn ProcessInventory>,
    store: HistoryStore,
    history: Mutex<History>,
    builder: SampleBuilder,
    analyzer: Analyzer,
    sinks: Vec<Arc<dyn ReportSink>>,
    health: HealthRegistry,
    metrics: AgentMetrics,
    logger: StructuredLogger,
}

impl AnalysisService {
    /// Load the persisted history and assemble the service
    pub fn new(
        inventory: Arc<dyn ProcessInventory>,
        store: HistoryStore,
        policy: AnalysisPolicy,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        let history = store.load();
        let metrics = AgentMetrics::new();
        metrics.set_history_samples(history.len());

        Self {
            inventory,
            store,
            history: Mutex::new(history),
            builder: SampleBuilder::new(policy.sample.clone()),
            analyzer: Analyzer::new(policy),
            sinks: Vec::new(),
            health,
            metrics,
            logger,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Number of samples currently held
    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }

    /// Snapshot of the current history
    pub async fn history(&self) -> History {
        self.history.lock().await.clone()
    }

    /// Snapshot, build, append, analyze and persist, then deliver
    ///
    /// Only a total inventory failure is an error. A failed save leaves the
    /// new sample in memory and marks the history component degraded.
    pub async fn run_once(&self) -> Result<AnalysisReport, RunError> {
        let start = Instant::now();

        let report = {
            let mut history = self.history.lock().await;

            let snapshot = match self.inventory.snapshot().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    self.metrics.inc_analysis_errors();
                    self.health
                        .set_unhealthy(components::INVENTORY, e.to_string())
                        .await;
                    return Err(e.into());
                }
            };
            self.health.set_healthy(components::INVENTORY).await;

            let outcome = self.builder.build(snapshot, Utc::now());
            debug!(
                processes = outcome.sample.processes.len(),
                skipped = outcome.skipped,
                filtered = outcome.filtered,
                "Sample built"
            );

            let next = history.clone().append(outcome.sample);
            let mut report = self
                .analyzer
                .analyze(&next)
                .ok_or(RunError::EmptyHistory)?;
            report.skipped_processes = outcome.skipped;

            match self.store.save(&next) {
                Ok(()) => self.health.set_healthy(components::HISTORY).await,
                Err(e) => {
                    warn!(error = %e, "Failed to persist history, keeping it in memory");
                    self.health
                        .set_degraded(components::HISTORY, format!("persist failed: {e}"))
                        .await;
                }
            }
            *history = next;
            report
        };

        self.metrics
            .observe_analysis_latency(start.elapsed().as_secs_f64());
        self.metrics.record_report(&report);
        self.logger.log_report(&report);

        self.deliver(&report).await;
        Ok(report)
    }

    async fn deliver(&self, report: &AnalysisReport) {
        if self.sinks.is_empty() {
            return;
        }

        let mut failed = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(report).await {
                self.logger.log_delivery_failure(sink.name(), &e);
                self.metrics.inc_sink_failures();
                failed.push(sink.name().to_string());
            }
        }

        if failed.is_empty() {
            self.health.set_healthy(components::SINK).await;
        } else {
            self.health
                .set_degraded(components::SINK, format!("delivery failed: {}", failed.join(", ")))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::async_trait;
    use crate::health::ComponentStatus;
    use crate::history::{MemoryLog, SampleLog};
    use crate::models::{InventorySnapshot, ProcessSkip, RawProcess, Sample};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed list of CPU readings, one per snapshot
    struct ScriptedInventory {
        cpu: Vec<f64>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl ScriptedInventory {
        fn new(cpu: &[f64]) -> Self {
            Self {
                cpu: cpu.to_vec(),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&[])
            }
        }
    }

    #[async_trait]
    impl ProcessInventory for ScriptedInventory {
        async fn snapshot(&self) -> Result<InventorySnapshot, InventoryError> {
            if self.fail {
                return Err(InventoryError::Unavailable("no process table".to_string()));
            }
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let cpu = self.cpu.get(i).copied().unwrap_or(10.0);
            Ok(InventorySnapshot {
                cpu_percent: cpu,
                ram_percent: 40.0,
                ram_used_gb: 6.4,
                ram_total_gb: 16.0,
                processes: vec![
                    Ok(RawProcess {
                        pid: 1,
                        name: format!("worker-{}", i),
                        memory_rss_bytes: 300 * 1024 * 1024,
                        cpu_percent: Some(cpu),
                        exe_path: None,
                    }),
                    Err(ProcessSkip::Vanished { pid: 2 }),
                ],
            })
        }
    }

    /// Sample log whose writes always fail
    struct ReadOnlyLog;

    impl SampleLog for ReadOnlyLog {
        fn read_all(&self) -> anyhow::Result<Option<Vec<Sample>>> {
            Ok(None)
        }

        fn replace_all(&self, _samples: &[Sample]) -> anyhow::Result<()> {
            anyhow::bail!("read-only filesystem")
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ReportSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn deliver(&self, _report: &AnalysisReport) -> anyhow::Result<()> {
            anyhow::bail!("webhook unreachable")
        }
    }

    async fn service(inventory: ScriptedInventory, log: Arc<dyn SampleLog>) -> AnalysisService {
        let health = HealthRegistry::new();
        health.register_all().await;
        AnalysisService::new(
            Arc::new(inventory),
            HistoryStore::new(log, 5),
            AnalysisPolicy::default(),
            health,
            StructuredLogger::new("test-host"),
        )
    }

    #[tokio::test]
    async fn test_run_once_appends_and_persists() {
        let log = Arc::new(MemoryLog::new());
        let svc = service(ScriptedInventory::new(&[20.0, 25.0]), log.clone()).await;

        let first = svc.run_once().await.unwrap();
        assert_eq!(first.history_len, 1);
        assert_eq!(first.skipped_processes, 1);

        let second = svc.run_once().await.unwrap();
        assert_eq!(second.history_len, 2);
        assert_eq!(second.new_processes, vec!["worker-1".to_string()]);

        let stored = log.read_all().unwrap().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(svc.history_len().await, 2);
    }

    #[tokio::test]
    async fn test_history_is_bounded_by_capacity() {
        let svc = service(ScriptedInventory::new(&[]), Arc::new(MemoryLog::new())).await;
        for _ in 0..8 {
            svc.run_once().await.unwrap();
        }
        assert_eq!(svc.history_len().await, 5);
    }

    #[tokio::test]
    async fn test_inventory_failure_is_fatal_and_leaves_history_alone() {
        let svc = service(ScriptedInventory::failing(), Arc::new(MemoryLog::new())).await;

        let err = svc.run_once().await.unwrap_err();
        assert!(matches!(err, RunError::Inventory(_)));
        assert_eq!(svc.history_len().await, 0);
        assert_eq!(
            svc.health().status(components::INVENTORY).await,
            Some(ComponentStatus::Unhealthy)
        );
    }

    #[tokio::test]
    async fn test_save_failure_still_returns_report() {
        let svc = service(ScriptedInventory::new(&[30.0]), Arc::new(ReadOnlyLog)).await;

        let report = svc.run_once().await.unwrap();
        assert_eq!(report.history_len, 1);
        assert_eq!(svc.history_len().await, 1);
        assert_eq!(
            svc.health().status(components::HISTORY).await,
            Some(ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_sink_failure_is_not_fatal() {
        let svc = service(ScriptedInventory::new(&[30.0]), Arc::new(MemoryLog::new()))
            .await
            .with_sink(Arc::new(FailingSink));

        tokio_test::assert_ok!(svc.run_once().await);
        assert_eq!(
            svc.health().status(components::SINK).await,
            Some(ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_concurrent_runs_do_not_lose_updates() {
        let svc = Arc::new(service(ScriptedInventory::new(&[]), Arc::new(MemoryLog::new())).await);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.run_once().await.map(|r| r.history_len) })
            })
            .collect();

        let mut lens = Vec::new();
        for handle in handles {
            lens.push(handle.await.unwrap().unwrap());
        }
        lens.sort();

        assert_eq!(lens, vec![1, 2, 3, 4]);
        let history = svc.history().await;
        assert_eq!(history.len(), 4);
        let stamps: Vec<_> = history.iter().map(|s| s.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }
}
