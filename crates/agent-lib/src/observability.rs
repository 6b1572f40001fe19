//! Observability for the telemetry agent
//!
//! Provides:
//! - Prometheus metrics (analysis latency, history length, risk score, host usage)
//! - Structured JSON logging of analysis events with tracing

use crate::analysis::{AnalysisReport, RiskTier};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Gauge,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for a full analysis run (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    analysis_latency_seconds: Histogram,
    history_samples: IntGauge,
    risk_score: IntGauge,
    cpu_percent: Gauge,
    ram_percent: Gauge,
    processes_tracked: IntGauge,
    anomalies_detected: IntCounter,
    skipped_processes: IntCounter,
    analysis_errors: IntCounter,
    sink_failures: IntCounter,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            analysis_latency_seconds: register_histogram!(
                "hostwatch_analysis_latency_seconds",
                "Time spent on one snapshot, analyze and persist run",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register analysis_latency_seconds"),

            history_samples: register_int_gauge!(
                "hostwatch_history_samples",
                "Number of samples currently held in the history"
            )
            .expect("Failed to register history_samples"),

            risk_score: register_int_gauge!(
                "hostwatch_risk_score",
                "Total risk score of the most recent analysis"
            )
            .expect("Failed to register risk_score"),

            cpu_percent: register_gauge!(
                "hostwatch_cpu_percent",
                "Host CPU usage at the most recent sample"
            )
            .expect("Failed to register cpu_percent"),

            ram_percent: register_gauge!(
                "hostwatch_ram_percent",
                "Host RAM usage at the most recent sample"
            )
            .expect("Failed to register ram_percent"),

            processes_tracked: register_int_gauge!(
                "hostwatch_processes_tracked",
                "Process groups retained in the most recent sample"
            )
            .expect("Failed to register processes_tracked"),

            anomalies_detected: register_int_counter!(
                "hostwatch_anomalies_detected_total",
                "Total number of baseline spikes detected"
            )
            .expect("Failed to register anomalies_detected"),

            skipped_processes: register_int_counter!(
                "hostwatch_skipped_processes_total",
                "Total number of unreadable or vanished process entries"
            )
            .expect("Failed to register skipped_processes"),

            analysis_errors: register_int_counter!(
                "hostwatch_analysis_errors_total",
                "Total number of analysis runs that failed"
            )
            .expect("Failed to register analysis_errors"),

            sink_failures: register_int_counter!(
                "hostwatch_sink_failures_total",
                "Total number of failed report deliveries"
            )
            .expect("Failed to register sink_failures"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_analysis_latency(&self, duration_secs: f64) {
        self.inner().analysis_latency_seconds.observe(duration_secs);
    }

    pub fn set_history_samples(&self, count: usize) {
        self.inner().history_samples.set(count as i64);
    }

    /// Publish the gauges and counters derived from a finished report
    pub fn record_report(&self, report: &AnalysisReport) {
        let inner = self.inner();
        inner.history_samples.set(report.history_len as i64);
        inner.risk_score.set(report.risk.total as i64);
        inner.cpu_percent.set(report.sample.cpu_percent);
        inner.ram_percent.set(report.sample.ram_percent);
        inner.processes_tracked.set(report.sample.processes.len() as i64);

        let spikes = report.anomalies.cpu_spike as u64 + report.anomalies.ram_spike as u64;
        inner.anomalies_detected.inc_by(spikes);
        inner.skipped_processes.inc_by(report.skipped_processes as u64);
    }

    pub fn inc_analysis_errors(&self) {
        self.inner().analysis_errors.inc();
    }

    pub fn inc_sink_failures(&self) {
        self.inner().sink_failures.inc();
    }
}

/// Structured logger for agent events
///
/// Every event carries a stable `event` field and the host name.
#[derive(Clone)]
pub struct StructuredLogger {
    host_name: String,
}

impl StructuredLogger {
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Log the outcome of an analysis run and the notable findings in it
    pub fn log_report(&self, report: &AnalysisReport) {
        if report.risk.tier >= RiskTier::High {
            warn!(
                event = "analysis_completed",
                host = %self.host_name,
                tier = %report.risk.tier,
                risk_total = report.risk.total,
                cpu_percent = report.sample.cpu_percent,
                ram_percent = report.sample.ram_percent,
                history_len = report.history_len,
                suspicious = report.suspicious.len(),
                "Analysis completed with elevated risk"
            );
        } else {
            info!(
                event = "analysis_completed",
                host = %self.host_name,
                tier = %report.risk.tier,
                risk_total = report.risk.total,
                cpu_percent = report.sample.cpu_percent,
                ram_percent = report.sample.ram_percent,
                history_len = report.history_len,
                suspicious = report.suspicious.len(),
                "Analysis completed"
            );
        }

        if report.anomalies.any() {
            let stats = report.baseline.stats();
            warn!(
                event = "baseline_spike_detected",
                host = %self.host_name,
                cpu_spike = report.anomalies.cpu_spike,
                ram_spike = report.anomalies.ram_spike,
                cpu_percent = report.sample.cpu_percent,
                mean_cpu = ?stats.map(|s| s.mean_cpu),
                mean_ram = ?stats.map(|s| s.mean_ram),
                "Usage above historical baseline"
            );
        }

        if !report.new_processes.is_empty() {
            info!(
                event = "new_processes_detected",
                host = %self.host_name,
                count = report.new_processes.len(),
                processes = ?report.new_processes,
                "Processes not seen in earlier samples"
            );
        }
    }

    pub fn log_delivery_failure(&self, sink: &str, error: &anyhow::Error) {
        warn!(
            event = "report_delivery_failed",
            host = %self.host_name,
            sink = %sink,
            error = %error,
            "Report delivery failed"
        );
    }

    pub fn log_startup(&self, version: &str, history_len: usize) {
        info!(
            event = "agent_started",
            host = %self.host_name,
            agent_version = %version,
            history_len = history_len,
            "Telemetry agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            host = %self.host_name,
            reason = %reason,
            "Telemetry agent shutting down"
        );
    }
}
