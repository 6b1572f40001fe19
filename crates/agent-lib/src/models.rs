//! Core data models for host telemetry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// One observation instant of host and process metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    #[serde(default)]
    pub ram_used_gb: f64,
    #[serde(default)]
    pub ram_total_gb: f64,
    #[serde(default)]
    pub processes: Vec<ProcessRecord>,
}

impl Sample {
    /// Look up a process record by name
    pub fn process(&self, name: &str) -> Option<&ProcessRecord> {
        self.processes.iter().find(|p| p.name == name)
    }

    /// Check whether a process name is present in this sample
    pub fn contains(&self, name: &str) -> bool {
        self.process(name).is_some()
    }

    /// Names of all processes in this sample
    pub fn process_names(&self) -> impl Iterator<Item = &str> {
        self.processes.iter().map(|p| p.name.as_str())
    }

    /// Check the value ranges and per-name uniqueness a built sample obeys
    pub fn validate(&self) -> Result<(), SampleDefect> {
        for (metric, value) in [("cpu_percent", self.cpu_percent), ("ram_percent", self.ram_percent)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(SampleDefect::OutOfRange { metric, value });
            }
        }
        for (metric, value) in [("ram_used_gb", self.ram_used_gb), ("ram_total_gb", self.ram_total_gb)] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(SampleDefect::OutOfRange { metric, value });
            }
        }

        let mut seen = HashSet::with_capacity(self.processes.len());
        for process in &self.processes {
            if process.name.is_empty() {
                return Err(SampleDefect::EmptyName);
            }
            if !seen.insert(process.name.as_str()) {
                return Err(SampleDefect::DuplicateProcess(process.name.clone()));
            }
            if process.instance_count == 0 {
                return Err(SampleDefect::NoInstances(process.name.clone()));
            }
            let memory_ok = [process.memory_mb_total, process.memory_mb_avg]
                .iter()
                .all(|m| *m >= 0.0 && m.is_finite());
            if !memory_ok {
                return Err(SampleDefect::NegativeMemory(process.name.clone()));
            }
        }
        Ok(())
    }
}

/// Why a stored sample cannot be used for analysis
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleDefect {
    #[error("{metric} out of range: {value}")]
    OutOfRange { metric: &'static str, value: f64 },
    #[error("process with empty name")]
    EmptyName,
    #[error("process {0} listed more than once")]
    DuplicateProcess(String),
    #[error("process {0} has no instances")]
    NoInstances(String),
    #[error("process {0} has negative or non-finite memory")]
    NegativeMemory(String),
}

/// Aggregated footprint of every OS process sharing one executable name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub name: String,
    pub instance_count: u32,
    pub memory_mb_total: f64,
    pub memory_mb_avg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub paths: BTreeSet<String>,
}

/// Raw per-process entry as reported by the inventory provider
#[derive(Debug, Clone, PartialEq)]
pub struct RawProcess {
    pub pid: u32,
    pub name: String,
    pub memory_rss_bytes: u64,
    pub cpu_percent: Option<f64>,
    pub exe_path: Option<String>,
}

/// Why a single process entry could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessSkip {
    /// Process exited between enumeration and read
    Vanished { pid: u32 },
    /// Permission denied or otherwise unreadable
    Unreadable { pid: u32, reason: String },
}

/// Host-wide metrics plus the per-process batch for one instant
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub ram_used_gb: f64,
    pub ram_total_gb: f64,
    pub processes: Vec<Result<RawProcess, ProcessSkip>>,
}
