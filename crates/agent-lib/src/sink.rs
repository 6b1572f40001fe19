//! Report delivery
//!
//! A finished `AnalysisReport` is handed to every configured sink. Delivery
//! failures are reported to the caller, which logs them and moves on.

use crate::analysis::AnalysisReport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Destination for finished reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Short identifier used in logs and metrics
    fn name(&self) -> &str;

    async fn deliver(&self, report: &AnalysisReport) -> Result<()>;
}

/// Emits the plain-text summary through tracing
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl ReportSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, report: &AnalysisReport) -> Result<()> {
        info!(
            tier = %report.risk.tier,
            summary = %report.render_summary(),
            "Analysis report"
        );
        Ok(())
    }
}

/// Writes each report as `report-YYYYMMDD-HHMMSS.json` into a directory
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Target path for a report
    pub fn path_for(&self, report: &AnalysisReport) -> PathBuf {
        let stamp = report.sample.timestamp.format("%Y%m%d-%H%M%S");
        self.dir.join(format!("report-{}.json", stamp))
    }
}

#[async_trait]
impl ReportSink for JsonFileSink {
    fn name(&self) -> &str {
        "json_file"
    }

    async fn deliver(&self, report: &AnalysisReport) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create report directory {:?}", self.dir))?;

        let path = self.path_for(report);
        let json = serde_json::to_vec_pretty(report).context("Failed to serialize report")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write report {:?}", path))?;

        info!(path = ?path, "Report written");
        Ok(())
    }
}
