//! Bounded FIFO history of Samples

use super::SampleLog;
use crate::models::Sample;
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

/// Default history capacity
pub const DEFAULT_CAPACITY: usize = 100;

/// Ordered sequence of Samples, oldest first, holding at most `capacity`
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl History {
    /// Create an empty history; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Build a history from stored samples, keeping only the newest `capacity`
    ///
    /// Samples that fail `Sample::validate` are dropped.
    pub fn from_samples(capacity: usize, samples: Vec<Sample>) -> Self {
        samples
            .into_iter()
            .filter(|sample| match sample.validate() {
                Ok(()) => true,
                Err(defect) => {
                    warn!(timestamp = %sample.timestamp, %defect, "Dropping invalid stored sample");
                    false
                }
            })
            .fold(Self::new(capacity), |history, sample| history.append(sample))
    }

    /// Return this history with `sample` appended and the oldest entries
    /// evicted down to capacity
    ///
    /// A sample stamped earlier than the newest stored one is moved up to
    /// that timestamp so timestamps never decrease.
    pub fn append(mut self, mut sample: Sample) -> Self {
        if let Some(last) = self.samples.back() {
            if sample.timestamp < last.timestamp {
                sample.timestamp = last.timestamp;
            }
        }

        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> + ExactSizeIterator {
        self.samples.iter()
    }

    /// Newest sample
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Everything except the newest sample
    pub fn prior(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().take(self.samples.len().saturating_sub(1))
    }

    /// The trailing `size` samples, oldest first
    pub fn window(&self, size: usize) -> impl Iterator<Item = &Sample> {
        self.samples.iter().skip(self.samples.len().saturating_sub(size))
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }
}

/// Loads and saves a History through a `SampleLog` backend
#[derive(Clone)]
pub struct HistoryStore {
    log: Arc<dyn SampleLog>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(log: Arc<dyn SampleLog>, capacity: usize) -> Self {
        Self {
            log,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Load the persisted history
    ///
    /// Missing or unreadable data yields an empty history; this never fails.
    pub fn load(&self) -> History {
        match self.log.read_all() {
            Ok(Some(samples)) => {
                let stored = samples.len();
                let history = History::from_samples(self.capacity, samples);
                info!(
                    stored,
                    loaded = history.len(),
                    capacity = self.capacity,
                    "Loaded sample history"
                );
                history
            }
            Ok(None) => {
                info!("No persisted history found, starting empty");
                History::new(self.capacity)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted history, starting empty");
                History::new(self.capacity)
            }
        }
    }

    /// Persist `history`, replacing whatever was stored
    pub fn save(&self, history: &History) -> Result<()> {
        self.log.replace_all(&history.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{JsonFileLog, MemoryLog};
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn sample(i: i64) -> Sample {
        Sample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i),
            cpu_percent: i as f64,
            ram_percent: 0.0,
            ram_used_gb: 0.0,
            ram_total_gb: 0.0,
            processes: vec![],
        }
    }

    #[test]
    fn test_append_evicts_oldest_first() {
        let history = (0..7).fold(History::new(5), |h, i| h.append(sample(i)));

        let cpus: Vec<f64> = history.iter().map(|s| s.cpu_percent).collect();
        assert_eq!(cpus, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_append_is_referentially_transparent() {
        let base = History::new(3).append(sample(0)).append(sample(1));

        let first = base.clone().append(sample(2));
        let second = base.clone().append(sample(2));

        assert_eq!(first, second);
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_append_keeps_timestamps_non_decreasing() {
        let history = History::new(5).append(sample(10)).append(sample(3));

        let stamps: Vec<_> = history.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps[0], stamps[1]);
    }

    #[test]
    fn test_prior_and_window() {
        let history = (0..6).fold(History::new(10), |h, i| h.append(sample(i)));

        assert_eq!(history.prior().count(), 5);
        let window: Vec<f64> = history.window(3).map(|s| s.cpu_percent).collect();
        assert_eq!(window, vec![3.0, 4.0, 5.0]);
        assert_eq!(history.window(50).count(), 6);
        assert_eq!(History::new(4).prior().count(), 0);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let history = History::new(0).append(sample(0)).append(sample(1));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_load_truncates_to_capacity() {
        let log = Arc::new(MemoryLog::with_samples((0..8).map(sample).collect()));
        let store = HistoryStore::new(log, 3);

        let history = store.load();
        assert_eq!(history.len(), 3);
        assert_eq!(history.latest().unwrap().cpu_percent, 7.0);
    }

    #[test]
    fn test_load_corrupt_file_yields_empty_history() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.json");
        std::fs::write(&path, b"[{\"timestamp\": 12").unwrap();

        let store = HistoryStore::new(Arc::new(JsonFileLog::new(path)), 20);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_drops_samples_that_break_value_rules() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.json");
        let process = |name: &str, instances: u32, memory: f64| {
            serde_json::json!({
                "name": name,
                "instance_count": instances,
                "memory_mb_total": memory,
                "memory_mb_avg": memory,
            })
        };
        let stored = serde_json::json!([
            { "timestamp": "2024-01-01T00:00:00Z", "cpu_percent": 250.0, "ram_percent": 10.0 },
            { "timestamp": "2024-01-01T00:01:00Z", "cpu_percent": -30.0, "ram_percent": 10.0 },
            {
                "timestamp": "2024-01-01T00:02:00Z", "cpu_percent": 20.0, "ram_percent": 10.0,
                "processes": [process("dup", 1, 200.0), process("dup", 1, 200.0)]
            },
            {
                "timestamp": "2024-01-01T00:03:00Z", "cpu_percent": 20.0, "ram_percent": 10.0,
                "processes": [process("", 1, 200.0)]
            },
            {
                "timestamp": "2024-01-01T00:04:00Z", "cpu_percent": 20.0, "ram_percent": 10.0,
                "processes": [process("idle", 0, 200.0)]
            },
            {
                "timestamp": "2024-01-01T00:05:00Z", "cpu_percent": 20.0, "ram_percent": 10.0,
                "processes": [process("leak", 1, -5.0)]
            },
            {
                "timestamp": "2024-01-01T00:06:00Z", "cpu_percent": 42.0, "ram_percent": 55.0,
                "processes": [process("postgres", 2, 300.0)]
            }
        ]);
        std::fs::write(&path, serde_json::to_vec(&stored).unwrap()).unwrap();

        let history = HistoryStore::new(Arc::new(JsonFileLog::new(path)), 20).load();

        assert_eq!(history.len(), 1);
        let kept = history.latest().unwrap();
        assert_eq!(kept.cpu_percent, 42.0);
        assert!(kept.contains("postgres"));
    }

    #[test]
    fn test_save_then_load_round_trip_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(
            Arc::new(JsonFileLog::new(temp_dir.path().join("history.json"))),
            20,
        );

        let history = (0..4).fold(store.load(), |h, i| h.append(sample(i)));
        store.save(&history).unwrap();

        assert_eq!(store.load(), history);
    }

    proptest! {
        #[test]
        fn prop_fifo_eviction_preserves_order(
            capacity in prop::sample::select(vec![1usize, 5, 20]),
            appends in 0usize..60,
        ) {
            let history = (0..appends as i64).fold(History::new(capacity), |h, i| h.append(sample(i)));

            prop_assert_eq!(history.len(), appends.min(capacity));
            let expected: Vec<f64> = (appends.saturating_sub(capacity)..appends)
                .map(|i| i as f64)
                .collect();
            let actual: Vec<f64> = history.iter().map(|s| s.cpu_percent).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
