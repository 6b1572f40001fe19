//! Baseline statistics over the sample history
//!
//! Mean and population standard deviation of CPU% and the configured RAM
//! scalar across every Sample in a History.

use crate::history::History;
use crate::models::Sample;
use crate::policy::RamMetric;
use serde::{Deserialize, Serialize};

/// Minimum samples required for a baseline
pub const MIN_BASELINE_SAMPLES: usize = 2;

/// Baseline over a history, or the reason there is none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Baseline {
    Insufficient { samples: usize },
    Ready(BaselineStats),
}

impl Baseline {
    pub fn stats(&self) -> Option<&BaselineStats> {
        match self {
            Baseline::Ready(stats) => Some(stats),
            Baseline::Insufficient { .. } => None,
        }
    }
}

/// Mean and population standard deviation of the host metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean_cpu: f64,
    pub stddev_cpu: f64,
    pub mean_ram: f64,
    pub stddev_ram: f64,
    pub ram_metric: RamMetric,
    pub samples: usize,
}

impl BaselineStats {
    /// Compute the baseline over every sample in `history`
    pub fn compute(history: &History, ram_metric: RamMetric) -> Baseline {
        if history.len() < MIN_BASELINE_SAMPLES {
            return Baseline::Insufficient {
                samples: history.len(),
            };
        }

        let cpu: Vec<f64> = history.iter().map(|s| s.cpu_percent).collect();
        let ram: Vec<f64> = history.iter().map(|s| ram_scalar(s, ram_metric)).collect();
        let (mean_cpu, stddev_cpu) = mean_and_stddev(&cpu);
        let (mean_ram, stddev_ram) = mean_and_stddev(&ram);

        Baseline::Ready(Self {
            mean_cpu,
            stddev_cpu,
            mean_ram,
            stddev_ram,
            ram_metric,
            samples: history.len(),
        })
    }

    /// CPU value above which a sample is a spike
    pub fn cpu_threshold(&self, k: f64) -> f64 {
        self.mean_cpu + k * self.stddev_cpu
    }

    /// RAM value above which a sample is a spike
    pub fn ram_threshold(&self, k: f64) -> f64 {
        self.mean_ram + k * self.stddev_ram
    }
}

/// The RAM scalar selected by `metric`
pub fn ram_scalar(sample: &Sample, metric: RamMetric) -> f64 {
    match metric {
        RamMetric::Percent => sample.ram_percent,
        RamMetric::UsedGb => sample.ram_used_gb,
    }
}

/// Two-pass mean and population standard deviation
fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Incremental mean/variance accumulator (Welford's algorithm)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OnlineStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl OnlineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance (divides by `count`)
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

impl FromIterator<f64> for OnlineStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::new();
        for value in iter {
            stats.push(value);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn history_of(values: &[(f64, f64)]) -> History {
        values.iter().fold(History::new(100), |h, (cpu, ram)| {
            h.append(Sample {
                timestamp: Utc::now(),
                cpu_percent: *cpu,
                ram_percent: *ram,
                ram_used_gb: ram / 10.0,
                ram_total_gb: 10.0,
                processes: vec![],
            })
        })
    }

    #[test]
    fn test_insufficient_below_two_samples() {
        assert_eq!(
            BaselineStats::compute(&history_of(&[]), RamMetric::Percent),
            Baseline::Insufficient { samples: 0 }
        );
        assert_eq!(
            BaselineStats::compute(&history_of(&[(10.0, 10.0)]), RamMetric::Percent),
            Baseline::Insufficient { samples: 1 }
        );
    }

    #[test]
    fn test_population_stddev() {
        let baseline = BaselineStats::compute(&history_of(&[(30.0, 40.0), (90.0, 45.0)]), RamMetric::Percent);
        let stats = baseline.stats().unwrap();

        assert!((stats.mean_cpu - 60.0).abs() < 1e-9);
        assert!((stats.stddev_cpu - 30.0).abs() < 1e-9);
        assert!((stats.mean_ram - 42.5).abs() < 1e-9);
        assert!((stats.stddev_ram - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_value_has_zero_stddev() {
        let baseline = BaselineStats::compute(&history_of(&[(50.0, 20.0); 6]), RamMetric::Percent);
        let stats = baseline.stats().unwrap();

        assert_eq!(stats.stddev_cpu, 0.0);
        assert_eq!(stats.stddev_ram, 0.0);
        assert_eq!(stats.cpu_threshold(2.0), 50.0);
    }

    #[test]
    fn test_used_gb_metric() {
        let baseline = BaselineStats::compute(&history_of(&[(0.0, 40.0), (0.0, 60.0)]), RamMetric::UsedGb);
        let stats = baseline.stats().unwrap();

        assert!((stats.mean_ram - 5.0).abs() < 1e-9);
        assert_eq!(stats.ram_metric, RamMetric::UsedGb);
    }

    proptest! {
        #[test]
        fn prop_online_matches_direct(values in prop::collection::vec(0.0f64..100.0, 2..200)) {
            let (mean, stddev) = mean_and_stddev(&values);
            let online: OnlineStats = values.iter().copied().collect();

            prop_assert!((online.mean() - mean).abs() < 1e-9);
            prop_assert!((online.std_dev() - stddev).abs() < 1e-9);
        }
    }
}
