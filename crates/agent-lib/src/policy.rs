//! Analysis policy
//!
//! Every threshold the engine applies lives here so that it can be supplied
//! from configuration instead of being baked into the analysis code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default memory-relevance threshold for a process group (MB)
pub const DEFAULT_MEMORY_THRESHOLD_MB: f64 = 100.0;

/// Default number of standard deviations for a baseline spike
pub const DEFAULT_SPIKE_K: f64 = 2.0;

/// Default trailing window for trend analysis
pub const DEFAULT_TREND_WINDOW: usize = 10;

/// Full policy handed to every analysis component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPolicy {
    pub sample: SampleFilter,
    pub anomaly: AnomalyPolicy,
    pub trend: TrendPolicy,
    pub suspicion: SuspicionPolicy,
    pub risk: RiskPolicy,
}

/// Which processes make it into a Sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleFilter {
    /// OS-critical process names excluded from every Sample
    pub ignore: BTreeSet<String>,
    /// Groups whose total memory is below this are dropped
    pub memory_threshold_mb: f64,
}

impl SampleFilter {
    /// Case-insensitive ignore-list check
    ///
    /// Kernel threads carry a per-CPU suffix (`kworker/0:1`, `ksoftirqd/3`),
    /// so the part before the first `/` is matched as well.
    pub fn is_ignored(&self, name: &str) -> bool {
        let base = name.split('/').next().unwrap_or(name);
        self.ignore
            .iter()
            .any(|i| i.eq_ignore_ascii_case(name) || (!base.is_empty() && i.eq_ignore_ascii_case(base)))
    }
}

impl Default for SampleFilter {
    fn default() -> Self {
        let ignore = [
            "System Idle Process",
            "System",
            "Registry",
            "Memory Compression",
            "smss.exe",
            "csrss.exe",
            "wininit.exe",
            "winlogon.exe",
            "services.exe",
            "lsass.exe",
            "svchost.exe",
            "fontdrvhost.exe",
            "dwm.exe",
            "kthreadd",
            "systemd",
            "kworker",
            "ksoftirqd",
            "rcu_sched",
            "migration",
        ];
        Self {
            ignore: ignore.iter().map(|s| s.to_string()).collect(),
            memory_threshold_mb: DEFAULT_MEMORY_THRESHOLD_MB,
        }
    }
}

/// Scalar used as the RAM metric by the baseline engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RamMetric {
    #[default]
    Percent,
    UsedGb,
}

/// Baseline spike detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyPolicy {
    /// Standard deviations above the mean that count as a spike
    pub k: f64,
    pub ram_metric: RamMetric,
}

impl Default for AnomalyPolicy {
    fn default() -> Self {
        Self {
            k: DEFAULT_SPIKE_K,
            ram_metric: RamMetric::Percent,
        }
    }
}

/// Trend classification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendPolicy {
    /// Number of trailing samples considered
    pub window: usize,
    pub cpu_delta: f64,
    pub ram_delta: f64,
    /// Average-memory growth (MB) that flags a process as growing
    pub process_growth_mb: f64,
}

impl Default for TrendPolicy {
    fn default() -> Self {
        Self {
            window: DEFAULT_TREND_WINDOW,
            cpu_delta: 10.0,
            ram_delta: 5.0,
            process_growth_mb: 50.0,
        }
    }
}

/// Heuristics for persistent suspicious processes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspicionPolicy {
    pub ubiquity_frequency: f64,
    pub high_memory_mb: f64,
    pub max_avg_instances: f64,
    pub unusual_frequency: f64,
    pub unusual_memory_mb: f64,
    /// Common end-user applications exempt from the "unusual" rule
    pub allow_list: BTreeSet<String>,
}

impl SuspicionPolicy {
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allow_list.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

impl Default for SuspicionPolicy {
    fn default() -> Self {
        let allow = [
            "chrome.exe",
            "chrome",
            "firefox.exe",
            "firefox",
            "msedge.exe",
            "explorer.exe",
            "Code.exe",
            "code",
            "Spotify.exe",
            "Discord.exe",
            "Teams.exe",
            "OUTLOOK.EXE",
            "WINWORD.EXE",
            "EXCEL.EXE",
            "slack",
        ];
        Self {
            ubiquity_frequency: 0.8,
            high_memory_mb: 400.0,
            max_avg_instances: 3.0,
            unusual_frequency: 0.5,
            unusual_memory_mb: 250.0,
            allow_list: allow.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Scoring thresholds and tier cut-offs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub cpu_elevated: f64,
    pub cpu_high: f64,
    pub ram_elevated: f64,
    pub ram_high: f64,
    /// Maximum points the suspicious-process count can contribute
    pub max_security_points: u32,
    /// Performance points per baseline spike; zero leaves spikes unscored
    pub spike_points: u32,
    /// Highest total still mapped to LOW
    pub low_max: u32,
    pub medium_max: u32,
    pub high_max: u32,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            cpu_elevated: 60.0,
            cpu_high: 75.0,
            ram_elevated: 70.0,
            ram_high: 85.0,
            max_security_points: 3,
            spike_points: 0,
            low_max: 2,
            medium_max: 5,
            high_max: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_thresholds() {
        let policy = AnalysisPolicy::default();
        assert_eq!(policy.sample.memory_threshold_mb, 100.0);
        assert_eq!(policy.anomaly.k, 2.0);
        assert_eq!(policy.trend.window, 10);
        assert_eq!(policy.trend.cpu_delta, 10.0);
        assert_eq!(policy.trend.ram_delta, 5.0);
        assert_eq!(policy.risk.high_max, 8);
    }

    #[test]
    fn test_partial_policy_deserializes_with_defaults() {
        let json = r#"{"anomaly": {"k": 3.0}, "risk": {"low_max": 1}}"#;
        let policy: AnalysisPolicy = serde_json::from_str(json).unwrap();

        assert_eq!(policy.anomaly.k, 3.0);
        assert_eq!(policy.anomaly.ram_metric, RamMetric::Percent);
        assert_eq!(policy.risk.low_max, 1);
        assert_eq!(policy.risk.medium_max, 5);
        assert_eq!(policy.trend, TrendPolicy::default());
    }

    #[test]
    fn test_name_lists_are_case_insensitive() {
        let filter = SampleFilter::default();
        assert!(filter.is_ignored("SVCHOST.EXE"));
        assert!(!filter.is_ignored("python"));

        let suspicion = SuspicionPolicy::default();
        assert!(suspicion.is_allowed("CHROME.EXE"));
    }

    #[test]
    fn test_kernel_threads_match_without_cpu_suffix() {
        let filter = SampleFilter::default();
        assert!(filter.is_ignored("kworker/0:1"));
        assert!(filter.is_ignored("kworker/u16:2-events_unbound"));
        assert!(filter.is_ignored("ksoftirqd/3"));
        assert!(filter.is_ignored("migration/7"));
        assert!(!filter.is_ignored("/usr/bin/python"));
        assert!(!filter.is_ignored("kworkers"));
    }
}
