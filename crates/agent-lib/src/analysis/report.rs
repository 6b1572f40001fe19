//! Full analysis pass over a History
//!
//! `Analyzer` wires the baseline, spike, trend, differ, risk and
//! recommendation stages together and bundles their outputs in an
//! `AnalysisReport`.

use super::baseline::{Baseline, BaselineStats};
use super::process_diff::{ProcessDiffer, SuspiciousProcess};
use super::recommendations::RecommendationGenerator;
use super::risk::{RiskAssessment, RiskScorer};
use super::spike_detector::{AnomalyFlags, SpikeDetector};
use super::trend::{TrendAnalyzer, TrendResult};
use crate::history::History;
use crate::models::Sample;
use crate::policy::{AnalysisPolicy, RamMetric};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Everything one analysis run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub sample: Sample,
    pub history_len: usize,
    pub baseline: Baseline,
    pub anomalies: AnomalyFlags,
    pub trend: TrendResult,
    pub new_processes: Vec<String>,
    pub suspicious: Vec<SuspiciousProcess>,
    pub risk: RiskAssessment,
    pub recommendations: Vec<String>,
    /// Inventory entries that could not be read for this sample
    #[serde(default)]
    pub skipped_processes: usize,
}

impl AnalysisReport {
    /// Plain-text digest for chat-style notification
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Risk {} (score {}: performance {}, stability {}, security {})",
            self.risk.tier,
            self.risk.total,
            self.risk.performance_score,
            self.risk.stability_score,
            self.risk.security_score
        );
        let _ = writeln!(
            out,
            "CPU {:.1}% ({})  RAM {:.1}% ({})  samples {}",
            self.sample.cpu_percent,
            self.trend.cpu_direction,
            self.sample.ram_percent,
            self.trend.ram_direction,
            self.history_len
        );
        if self.anomalies.any() {
            let mut spikes = Vec::new();
            if self.anomalies.cpu_spike {
                spikes.push("CPU");
            }
            if self.anomalies.ram_spike {
                spikes.push("RAM");
            }
            let _ = writeln!(out, "Baseline spike: {}", spikes.join(", "));
        }
        if !self.new_processes.is_empty() {
            let _ = writeln!(out, "New processes: {}", self.new_processes.join(", "));
        }
        for s in &self.suspicious {
            let reasons: Vec<&str> = s.reasons.iter().map(|r| r.label()).collect();
            let _ = writeln!(
                out,
                "Suspicious: {} (seen {:.0}%, {:.0} MB avg) - {}",
                s.name,
                s.frequency * 100.0,
                s.avg_memory_mb,
                reasons.join(", ")
            );
        }
        out.push_str("Recommendations:\n");
        for r in &self.recommendations {
            let _ = writeln!(out, "- {}", r);
        }
        out
    }
}

/// Runs every analysis stage with one policy
#[derive(Debug, Clone)]
pub struct Analyzer {
    ram_metric: RamMetric,
    spikes: SpikeDetector,
    trend: TrendAnalyzer,
    differ: ProcessDiffer,
    scorer: RiskScorer,
    advisor: RecommendationGenerator,
}

impl Analyzer {
    pub fn new(policy: AnalysisPolicy) -> Self {
        Self {
            ram_metric: policy.anomaly.ram_metric,
            spikes: SpikeDetector::new(policy.anomaly),
            trend: TrendAnalyzer::new(policy.trend),
            differ: ProcessDiffer::new(policy.suspicion),
            scorer: RiskScorer::new(policy.risk.clone()),
            advisor: RecommendationGenerator::new(policy.risk),
        }
    }

    /// Analyze the newest sample of `history` against the whole of it
    ///
    /// Returns `None` only for an empty history.
    pub fn analyze(&self, history: &History) -> Option<AnalysisReport> {
        let sample = history.latest()?;

        let baseline = BaselineStats::compute(history, self.ram_metric);
        let anomalies = self.spikes.detect(sample, &baseline);
        let trend = self.trend.analyze(history);
        let new_processes = self.differ.new_processes(history);
        let suspicious = self.differ.suspicious(history);
        let risk = self.scorer.assess(sample, &anomalies, &trend, &suspicious);
        let recommendations = self
            .advisor
            .generate(sample, &anomalies, &trend, &suspicious, &risk);

        Some(AnalysisReport {
            generated_at: Utc::now(),
            sample: sample.clone(),
            history_len: history.len(),
            baseline,
            anomalies,
            trend,
            new_processes,
            suspicious,
            risk,
            recommendations,
            skipped_processes: 0,
        })
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisPolicy::default())
    }
}
