//! Short-window trend classification
//!
//! Compares the last value of a trailing window to its first value, for host
//! CPU/RAM and for each process's average memory.

use crate::history::History;
use crate::policy::TrendPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Direction of a metric over the trend window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Rising,
    Falling,
    Stable,
    Insufficient,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Rising => write!(f, "rising"),
            Direction::Falling => write!(f, "falling"),
            Direction::Stable => write!(f, "stable"),
            Direction::Insufficient => write!(f, "insufficient data"),
        }
    }
}

/// Classify `series` by comparing its last value to its first
///
/// A delta exactly equal to the threshold is stable.
pub fn direction(series: &[f64], delta_up: f64, delta_down: f64) -> Direction {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Direction::Insufficient;
    };
    if series.len() < 2 {
        return Direction::Insufficient;
    }

    if *last > first + delta_up {
        Direction::Rising
    } else if *last < first - delta_down {
        Direction::Falling
    } else {
        Direction::Stable
    }
}

/// Trend outcome for the current window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub cpu_direction: Direction,
    pub ram_direction: Direction,
    /// Process name -> average-memory growth (MB) across the window
    pub growing_processes: BTreeMap<String, f64>,
    pub window_len: usize,
}

/// Computes trends over a trailing window of the history
#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    policy: TrendPolicy,
}

impl TrendAnalyzer {
    pub fn new(policy: TrendPolicy) -> Self {
        Self { policy }
    }

    /// Effective window size; a window below two points could never classify
    pub fn window_size(&self) -> usize {
        self.policy.window.max(2)
    }

    pub fn analyze(&self, history: &History) -> TrendResult {
        let window: Vec<_> = history.window(self.window_size()).collect();

        let cpu: Vec<f64> = window.iter().map(|s| s.cpu_percent).collect();
        let ram: Vec<f64> = window.iter().map(|s| s.ram_percent).collect();

        // Per-process memory series; absent samples are skipped
        let mut series: HashMap<&str, Vec<f64>> = HashMap::new();
        for sample in &window {
            for process in &sample.processes {
                series
                    .entry(process.name.as_str())
                    .or_default()
                    .push(process.memory_mb_avg);
            }
        }

        let growing_processes = series
            .into_iter()
            .filter(|(_, values)| values.len() >= 2)
            .filter_map(|(name, values)| {
                let growth = values[values.len() - 1] - values[0];
                (growth > self.policy.process_growth_mb).then(|| (name.to_string(), growth))
            })
            .collect();

        TrendResult {
            cpu_direction: direction(&cpu, self.policy.cpu_delta, self.policy.cpu_delta),
            ram_direction: direction(&ram, self.policy.ram_delta, self.policy.ram_delta),
            growing_processes,
            window_len: window.len(),
        }
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(TrendPolicy::default())
    }
}
