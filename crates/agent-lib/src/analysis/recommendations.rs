//! Advisory text derived from a finished analysis

use super::process_diff::SuspiciousProcess;
use super::risk::{RiskAssessment, RiskTier};
use super::spike_detector::AnomalyFlags;
use super::trend::TrendResult;
use crate::models::Sample;
use crate::policy::RiskPolicy;

/// Emitted when no condition triggers
pub const ALL_CLEAR: &str = "System operating within normal parameters. No action required.";

/// Maps triggered conditions to one advisory each
#[derive(Debug, Clone, Default)]
pub struct RecommendationGenerator {
    policy: RiskPolicy,
}

impl RecommendationGenerator {
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    pub fn generate(
        &self,
        sample: &Sample,
        anomalies: &AnomalyFlags,
        trend: &TrendResult,
        suspicious: &[SuspiciousProcess],
        risk: &RiskAssessment,
    ) -> Vec<String> {
        let mut out = Vec::new();

        if risk.tier >= RiskTier::High {
            out.push(format!(
                "Overall risk is {} (score {}): address the items below before they affect users.",
                risk.tier, risk.total
            ));
        }

        if sample.cpu_percent > self.policy.cpu_elevated {
            let top = sample
                .processes
                .iter()
                .filter(|p| p.cpu_percent.is_some())
                .max_by(|a, b| a.cpu_percent.partial_cmp(&b.cpu_percent).unwrap_or(std::cmp::Ordering::Equal))
                .map(|p| format!(" (top consumer: {})", p.name))
                .unwrap_or_default();
            out.push(format!(
                "High CPU usage ({:.1}%): close or reschedule CPU-intensive applications{}.",
                sample.cpu_percent, top
            ));
        }

        if sample.ram_percent > self.policy.ram_elevated {
            let top = sample
                .processes
                .first()
                .map(|p| format!(" (largest: {} at {:.0} MB)", p.name, p.memory_mb_total))
                .unwrap_or_default();
            out.push(format!(
                "High RAM usage ({:.1}%): close unused applications or add memory{}.",
                sample.ram_percent, top
            ));
        }

        if anomalies.cpu_spike {
            out.push("CPU usage is well above its historical baseline; check for runaway or newly started workloads.".to_string());
        }
        if anomalies.ram_spike {
            out.push("RAM usage is well above its historical baseline; look for recently launched memory-heavy processes.".to_string());
        }

        if !suspicious.is_empty() {
            let names: Vec<&str> = suspicious.iter().map(|s| s.name.as_str()).collect();
            out.push(format!(
                "Review {} suspicious persistent process(es): {}. Verify they are expected and trusted.",
                suspicious.len(),
                names.join(", ")
            ));
        }

        if !trend.growing_processes.is_empty() {
            let names: Vec<&str> = trend.growing_processes.keys().map(String::as_str).collect();
            out.push(format!(
                "Memory keeps growing in: {}. Possible leak; consider restarting these processes.",
                names.join(", ")
            ));
        }

        if out.is_empty() {
            out.push(ALL_CLEAR.to_string());
        }

        out
    }
}
