//! Process-set differencing over the history
//!
//! Identifies processes that are new in the current sample and processes
//! whose long-run presence or footprint matches a suspicion heuristic.

use super::baseline::OnlineStats;
use crate::history::History;
use crate::policy::SuspicionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Names in the newest sample that appear in no earlier sample
///
/// With no earlier samples there is nothing to compare against, so nothing
/// is reported as new.
pub fn new_processes(history: &History) -> Vec<String> {
    let Some(current) = history.latest() else {
        return Vec::new();
    };
    if history.len() < 2 {
        return Vec::new();
    }

    let seen: HashSet<&str> = history.prior().flat_map(|s| s.process_names()).collect();

    current
        .process_names()
        .filter(|name| !seen.contains(name))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Heuristic that flagged a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionReason {
    NearUbiquitous,
    SustainedHighMemory,
    ExcessiveInstances,
    UnusualPersistentUse,
}

impl SuspicionReason {
    pub fn label(&self) -> &'static str {
        match self {
            SuspicionReason::NearUbiquitous => "near-ubiquitous presence",
            SuspicionReason::SustainedHighMemory => "sustained high memory",
            SuspicionReason::ExcessiveInstances => "excessive instance count",
            SuspicionReason::UnusualPersistentUse => "unusual persistent resource use",
        }
    }
}

impl std::fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A process whose historical pattern triggered at least one heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousProcess {
    pub name: String,
    /// Fraction of samples containing the process
    pub frequency: f64,
    pub avg_memory_mb: f64,
    pub avg_instance_count: f64,
    pub reasons: BTreeSet<SuspicionReason>,
}

#[derive(Default)]
struct Presence {
    memory: OnlineStats,
    instances: OnlineStats,
}

/// Applies the suspicion heuristics to a history
#[derive(Debug, Clone)]
pub struct ProcessDiffer {
    policy: SuspicionPolicy,
}

impl ProcessDiffer {
    pub fn new(policy: SuspicionPolicy) -> Self {
        Self { policy }
    }

    pub fn new_processes(&self, history: &History) -> Vec<String> {
        new_processes(history)
    }

    /// Suspicious processes over the full history, highest average memory first
    pub fn suspicious(&self, history: &History) -> Vec<SuspiciousProcess> {
        if history.is_empty() {
            return Vec::new();
        }

        let mut presence: BTreeMap<&str, Presence> = BTreeMap::new();
        for sample in history.iter() {
            for process in &sample.processes {
                let entry = presence.entry(process.name.as_str()).or_default();
                entry.memory.push(process.memory_mb_avg);
                entry.instances.push(process.instance_count as f64);
            }
        }

        let total = history.len() as f64;
        let mut flagged: Vec<SuspiciousProcess> = presence
            .into_iter()
            .filter_map(|(name, p)| {
                let candidate = SuspiciousProcess {
                    name: name.to_string(),
                    frequency: p.memory.count() as f64 / total,
                    avg_memory_mb: p.memory.mean(),
                    avg_instance_count: p.instances.mean(),
                    reasons: BTreeSet::new(),
                };
                let reasons = self.reasons_for(&candidate);
                (!reasons.is_empty()).then(|| SuspiciousProcess { reasons, ..candidate })
            })
            .collect();

        flagged.sort_by(|a, b| {
            b.avg_memory_mb
                .partial_cmp(&a.avg_memory_mb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        flagged
    }

    fn reasons_for(&self, p: &SuspiciousProcess) -> BTreeSet<SuspicionReason> {
        let policy = &self.policy;
        let mut reasons = BTreeSet::new();

        if p.frequency > policy.ubiquity_frequency {
            reasons.insert(SuspicionReason::NearUbiquitous);
        }
        if p.avg_memory_mb > policy.high_memory_mb {
            reasons.insert(SuspicionReason::SustainedHighMemory);
        }
        if p.avg_instance_count > policy.max_avg_instances {
            reasons.insert(SuspicionReason::ExcessiveInstances);
        }
        if !policy.is_allowed(&p.name)
            && p.frequency > policy.unusual_frequency
            && p.avg_memory_mb > policy.unusual_memory_mb
        {
            reasons.insert(SuspicionReason::UnusualPersistentUse);
        }
        reasons
    }
}

impl Default for ProcessDiffer {
    fn default() -> Self {
        Self::new(SuspicionPolicy::default())
    }
}
