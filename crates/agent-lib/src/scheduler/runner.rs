//! Scheduled analysis loop
//!
//! Ticks every configured interval and triggers a run only while the
//! schedule window is open. Shutdown is checked between ticks, never in the
//! middle of a run.

use super::service::AnalysisService;
use super::window::ScheduleWindow;
use crate::health::components;
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Counters for one scheduler lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub runs: u64,
    pub failures: u64,
    pub outside_window: u64,
}

/// Periodic trigger for `AnalysisService::run_once`
pub struct AnalysisScheduler {
    service: Arc<AnalysisService>,
    window: ScheduleWindow,
    interval: Duration,
    clock: Clock,
}

impl AnalysisScheduler {
    pub fn new(service: Arc<AnalysisService>, window: ScheduleWindow) -> Self {
        Self {
            interval: window.interval(),
            service,
            window,
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Override the tick period taken from the schedule
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replace the local wall clock used for window checks
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Run until `shutdown` fires
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> SchedulerStats {
        info!(
            interval_secs = self.interval.as_secs(),
            active = self.window.is_active(),
            "Starting scheduled analysis loop"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = SchedulerStats::default();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    stats.ticks += 1;
                    self.tick(&mut stats).await;
                }
                _ = shutdown.recv() => {
                    info!(runs = stats.runs, failures = stats.failures, "Shutting down scheduled analysis loop");
                    break;
                }
            }
        }

        stats
    }

    async fn tick(&self, stats: &mut SchedulerStats) {
        let now = (self.clock)();
        if !self.window.is_open_at(now) {
            stats.outside_window += 1;
            debug!(now = %now, "Outside schedule window, skipping run");
            return;
        }

        let health = self.service.health();
        match self.service.run_once().await {
            Ok(report) => {
                stats.runs += 1;
                health.set_healthy(components::SCHEDULER).await;
                debug!(tier = %report.risk.tier, "Scheduled analysis complete");
            }
            Err(e) => {
                stats.failures += 1;
                warn!(error = %e, "Scheduled analysis failed, retrying next tick");
                health
                    .set_degraded(components::SCHEDULER, format!("last run failed: {e}"))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{async_trait, InventoryError, ProcessInventory};
    use crate::health::{ComponentStatus, HealthRegistry};
    use crate::history::{HistoryStore, MemoryLog};
    use crate::models::InventorySnapshot;
    use crate::observability::StructuredLogger;
    use crate::policy::AnalysisPolicy;
    use crate::scheduler::ScheduleConfig;
    use chrono::NaiveDate;

    struct StaticInventory {
        available: bool,
        latency: Duration,
    }

    #[async_trait]
    impl ProcessInventory for StaticInventory {
        async fn snapshot(&self) -> Result<InventorySnapshot, InventoryError> {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if !self.available {
                return Err(InventoryError::Refresh("sensor offline".to_string()));
            }
            Ok(InventorySnapshot {
                cpu_percent: 15.0,
                ram_percent: 35.0,
                ..Default::default()
            })
        }
    }

    async fn service(available: bool) -> Arc<AnalysisService> {
        service_with_latency(available, Duration::ZERO).await
    }

    async fn service_with_latency(available: bool, latency: Duration) -> Arc<AnalysisService> {
        let health = HealthRegistry::new();
        health.register_all().await;
        Arc::new(AnalysisService::new(
            Arc::new(StaticInventory { available, latency }),
            HistoryStore::new(Arc::new(MemoryLog::new()), 50),
            AnalysisPolicy::default(),
            health,
            StructuredLogger::new("test-host"),
        ))
    }

    fn monday_noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn weekdays_window() -> ScheduleWindow {
        ScheduleConfig {
            days: vec!["monday".to_string(), "tuesday".to_string()],
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
            ..Default::default()
        }
        .window()
        .unwrap()
    }

    /// Runs the scheduler on the paused test clock and stops it after `ms`
    async fn run_for(scheduler: AnalysisScheduler, ms: u64) -> SchedulerStats {
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(scheduler.run(rx));
        tokio::time::sleep(Duration::from_millis(ms)).await;
        tx.send(()).unwrap();
        handle.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_inside_window() {
        let svc = service(true).await;
        let scheduler = AnalysisScheduler::new(svc.clone(), weekdays_window())
            .with_interval(Duration::from_millis(10))
            .with_clock(monday_noon);

        let stats = run_for(scheduler, 55).await;

        // Ticks at 0, 10, 20, 30, 40 and 50 ms
        assert_eq!(stats.ticks, 6);
        assert_eq!(stats.runs, 6);
        assert_eq!(stats.outside_window, 0);
        assert_eq!(svc.history_len().await as u64, stats.runs);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_outside_window() {
        let svc = service(true).await;
        let sunday = || {
            NaiveDate::from_ymd_opt(2024, 1, 7)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        };
        let scheduler = AnalysisScheduler::new(svc.clone(), weekdays_window())
            .with_interval(Duration::from_millis(10))
            .with_clock(sunday);

        let stats = run_for(scheduler, 35).await;

        assert_eq!(stats.runs, 0);
        assert_eq!(stats.outside_window, 4);
        assert_eq!(svc.history_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let svc = service(false).await;
        let scheduler = AnalysisScheduler::new(svc.clone(), weekdays_window())
            .with_interval(Duration::from_millis(10))
            .with_clock(monday_noon);

        let stats = run_for(scheduler, 45).await;

        assert_eq!(stats.failures, 5);
        assert_eq!(stats.runs, 0);
        assert_eq!(
            svc.health().status(components::SCHEDULER).await,
            Some(ComponentStatus::Degraded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_run_in_progress() {
        let svc = service_with_latency(true, Duration::from_millis(150)).await;
        let scheduler = AnalysisScheduler::new(svc.clone(), weekdays_window())
            .with_interval(Duration::from_secs(60))
            .with_clock(monday_noon);
        let started = tokio::time::Instant::now();

        // First tick fires immediately; shutdown lands while its snapshot is pending
        let stats = run_for(scheduler, 30).await;

        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.failures, 0);
        assert_eq!(svc.history_len().await, 1);
    }

    #[tokio::test]
    async fn test_schedule_interval_is_used_by_default() {
        let svc = service(true).await;
        let scheduler = AnalysisScheduler::new(svc, weekdays_window());
        assert_eq!(scheduler.interval, Duration::from_secs(3600));
    }
}
