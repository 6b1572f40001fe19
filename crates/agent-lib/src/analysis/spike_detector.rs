//! Baseline deviation detection
//!
//! Flags a sample whose CPU or RAM exceeds the baseline mean by more than
//! `k` standard deviations.

use super::baseline::{ram_scalar, Baseline};
use crate::models::Sample;
use crate::policy::AnomalyPolicy;
use serde::{Deserialize, Serialize};

/// Spike flags for one sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyFlags {
    pub cpu_spike: bool,
    pub ram_spike: bool,
}

impl AnomalyFlags {
    pub fn any(&self) -> bool {
        self.cpu_spike || self.ram_spike
    }
}

/// Detects CPU and RAM spikes against a baseline
#[derive(Debug, Clone)]
pub struct SpikeDetector {
    policy: AnomalyPolicy,
}

impl SpikeDetector {
    pub fn new(policy: AnomalyPolicy) -> Self {
        Self { policy }
    }

    /// Compare `sample` against `baseline`
    ///
    /// An insufficient baseline never reports a spike.
    pub fn detect(&self, sample: &Sample, baseline: &Baseline) -> AnomalyFlags {
        let Some(stats) = baseline.stats() else {
            return AnomalyFlags::default();
        };

        AnomalyFlags {
            cpu_spike: sample.cpu_percent > stats.cpu_threshold(self.policy.k),
            ram_spike: ram_scalar(sample, stats.ram_metric) > stats.ram_threshold(self.policy.k),
        }
    }
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self::new(AnomalyPolicy::default())
    }
}
