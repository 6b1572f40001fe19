//! Sample construction from raw inventory snapshots
//!
//! Groups raw process entries by executable name, sums their memory, and
//! applies the configured ignore-list and memory-relevance threshold.

use crate::models::{InventorySnapshot, ProcessRecord, ProcessSkip, Sample};
use crate::policy::SampleFilter;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Result of building one Sample, with per-item accounting
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub sample: Sample,
    /// Raw entries that could not be read
    pub skipped: usize,
    /// Process groups dropped by the filter policy
    pub filtered: usize,
}

/// Builds normalized Samples from inventory snapshots
#[derive(Debug, Clone, Default)]
pub struct SampleBuilder {
    filter: SampleFilter,
}

#[derive(Default)]
struct Group {
    instances: u32,
    memory_mb: f64,
    cpu: Option<f64>,
    paths: BTreeSet<String>,
}

impl SampleBuilder {
    pub fn new(filter: SampleFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &SampleFilter {
        &self.filter
    }

    /// Build a Sample stamped with `timestamp`
    ///
    /// Processes come out sorted by descending total memory, ties broken by
    /// name. Callers should not depend on that order.
    pub fn build(&self, snapshot: InventorySnapshot, timestamp: DateTime<Utc>) -> BuildOutcome {
        let mut groups: BTreeMap<String, Group> = BTreeMap::new();
        let mut skipped = 0;

        for entry in snapshot.processes {
            let raw = match entry {
                Ok(raw) => raw,
                Err(skip) => {
                    skipped += 1;
                    match skip {
                        ProcessSkip::Vanished { pid } => {
                            debug!(pid, "Process vanished before it could be read")
                        }
                        ProcessSkip::Unreadable { pid, reason } => {
                            debug!(pid, reason = %reason, "Skipping unreadable process")
                        }
                    }
                    continue;
                }
            };

            let group = groups.entry(raw.name.trim().to_string()).or_default();
            group.instances += 1;
            group.memory_mb += raw.memory_rss_bytes as f64 / BYTES_PER_MB;
            if let Some(cpu) = raw.cpu_percent {
                group.cpu = Some(group.cpu.unwrap_or(0.0) + cpu.max(0.0));
            }
            if let Some(path) = raw.exe_path {
                group.paths.insert(path);
            }
        }

        let total_groups = groups.len();
        let mut processes: Vec<ProcessRecord> = groups
            .into_iter()
            .filter(|(name, group)| {
                !name.is_empty()
                    && !self.filter.is_ignored(name)
                    && group.memory_mb >= self.filter.memory_threshold_mb
            })
            .map(|(name, group)| ProcessRecord {
                name,
                instance_count: group.instances,
                memory_mb_total: group.memory_mb,
                memory_mb_avg: group.memory_mb / group.instances as f64,
                cpu_percent: group.cpu,
                paths: group.paths,
            })
            .collect();
        let filtered = total_groups - processes.len();

        processes.sort_by(|a, b| {
            b.memory_mb_total
                .partial_cmp(&a.memory_mb_total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });

        BuildOutcome {
            sample: Sample {
                timestamp,
                cpu_percent: clamp_percent(snapshot.cpu_percent),
                ram_percent: clamp_percent(snapshot.ram_percent),
                ram_used_gb: snapshot.ram_used_gb.max(0.0),
                ram_total_gb: snapshot.ram_total_gb.max(0.0),
                processes,
            },
            skipped,
            filtered,
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
