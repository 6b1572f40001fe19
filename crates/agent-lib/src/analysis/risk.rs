//! Composite risk scoring
//!
//! Adds performance, stability and security points from fixed rules and maps
//! the total onto a coarse tier.

use super::process_diff::SuspiciousProcess;
use super::spike_detector::AnomalyFlags;
use super::trend::{Direction, TrendResult};
use crate::models::Sample;
use crate::policy::RiskPolicy;
use serde::{Deserialize, Serialize};

/// Coarse risk category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Low => write!(f, "LOW"),
            RiskTier::Medium => write!(f, "MEDIUM"),
            RiskTier::High => write!(f, "HIGH"),
            RiskTier::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Scored risk with the reasons behind each point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub performance_score: u32,
    pub stability_score: u32,
    pub security_score: u32,
    pub total: u32,
    pub tier: RiskTier,
    pub reasons: Vec<String>,
}

/// Applies the scoring rules of a `RiskPolicy`
#[derive(Debug, Clone)]
pub struct RiskScorer {
    policy: RiskPolicy,
}

impl RiskScorer {
    pub fn new(policy: RiskPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Tier for a total score
    pub fn tier_for(&self, total: u32) -> RiskTier {
        if total <= self.policy.low_max {
            RiskTier::Low
        } else if total <= self.policy.medium_max {
            RiskTier::Medium
        } else if total <= self.policy.high_max {
            RiskTier::High
        } else {
            RiskTier::Critical
        }
    }

    pub fn assess(
        &self,
        sample: &Sample,
        anomalies: &AnomalyFlags,
        trend: &TrendResult,
        suspicious: &[SuspiciousProcess],
    ) -> RiskAssessment {
        let p = &self.policy;
        let mut reasons = Vec::new();

        let mut performance = 0;
        if sample.cpu_percent > p.cpu_high {
            performance += 2;
            reasons.push(format!("CPU usage very high ({:.1}% > {}%)", sample.cpu_percent, p.cpu_high));
        } else if sample.cpu_percent > p.cpu_elevated {
            performance += 1;
            reasons.push(format!("CPU usage elevated ({:.1}% > {}%)", sample.cpu_percent, p.cpu_elevated));
        }
        if sample.ram_percent > p.ram_high {
            performance += 2;
            reasons.push(format!("RAM usage very high ({:.1}% > {}%)", sample.ram_percent, p.ram_high));
        } else if sample.ram_percent > p.ram_elevated {
            performance += 1;
            reasons.push(format!("RAM usage elevated ({:.1}% > {}%)", sample.ram_percent, p.ram_elevated));
        }
        if p.spike_points > 0 {
            if anomalies.cpu_spike {
                performance += p.spike_points;
                reasons.push("CPU above historical baseline".to_string());
            }
            if anomalies.ram_spike {
                performance += p.spike_points;
                reasons.push("RAM above historical baseline".to_string());
            }
        }

        let mut stability = 0;
        if trend.cpu_direction == Direction::Rising {
            stability += 1;
            reasons.push("CPU usage trending upward".to_string());
        }
        if trend.ram_direction == Direction::Rising {
            stability += 1;
            reasons.push("RAM usage trending upward".to_string());
        }
        if !trend.growing_processes.is_empty() {
            stability += 1;
            reasons.push(format!(
                "Memory growing in {} process(es)",
                trend.growing_processes.len()
            ));
        }

        let security = (suspicious.len() as u32).min(p.max_security_points);
        if security > 0 {
            reasons.push(format!("{} suspicious persistent process(es)", suspicious.len()));
        }

        let total = performance + stability + security;
        RiskAssessment {
            performance_score: performance,
            stability_score: stability,
            security_score: security,
            total,
            tier: self.tier_for(total),
            reasons,
        }
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(RiskPolicy::default())
    }
}
