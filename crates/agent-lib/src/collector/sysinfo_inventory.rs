//! Process inventory backed by the `sysinfo` crate

use super::{async_trait, InventoryError, ProcessInventory};
use crate::models::{InventorySnapshot, ProcessSkip, RawProcess};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::System;
use tracing::debug;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Inventory provider reading the local host through `sysinfo`
///
/// The underlying `System` is kept between snapshots: CPU usage is a delta
/// between two refreshes, so the first snapshot primes it and waits one
/// CPU update interval before reading.
#[derive(Clone)]
pub struct SysinfoInventory {
    system: Arc<Mutex<System>>,
    primed: Arc<Mutex<bool>>,
}

impl SysinfoInventory {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            primed: Arc::new(Mutex::new(false)),
        }
    }

    fn capture(system: &Mutex<System>, primed: &Mutex<bool>) -> Result<InventorySnapshot, InventoryError> {
        let mut sys = system
            .lock()
            .map_err(|_| InventoryError::Unavailable("system handle poisoned".to_string()))?;
        let mut primed = primed
            .lock()
            .map_err(|_| InventoryError::Unavailable("system handle poisoned".to_string()))?;

        if !*primed {
            sys.refresh_cpu();
            sys.refresh_processes();
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(Duration::from_millis(200)));
            *primed = true;
        }

        sys.refresh_cpu();
        sys.refresh_memory();
        sys.refresh_processes();

        let total = sys.total_memory();
        if total == 0 {
            return Err(InventoryError::Refresh("total memory reported as zero".to_string()));
        }
        let used = sys.used_memory();

        let processes: Vec<_> = sys
            .processes()
            .iter()
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                let name = process.name().to_string();
                if name.trim().is_empty() {
                    return Err(ProcessSkip::Unreadable {
                        pid,
                        reason: "empty process name".to_string(),
                    });
                }
                Ok(RawProcess {
                    pid,
                    name,
                    memory_rss_bytes: process.memory(),
                    cpu_percent: Some(process.cpu_usage() as f64),
                    exe_path: process.exe().map(|p| p.display().to_string()),
                })
            })
            .collect();

        debug!(processes = processes.len(), "Captured process inventory");

        Ok(InventorySnapshot {
            cpu_percent: sys.global_cpu_info().cpu_usage() as f64,
            ram_percent: used as f64 / total as f64 * 100.0,
            ram_used_gb: used as f64 / BYTES_PER_GB,
            ram_total_gb: total as f64 / BYTES_PER_GB,
            processes,
        })
    }
}

impl Default for SysinfoInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessInventory for SysinfoInventory {
    async fn snapshot(&self) -> Result<InventorySnapshot, InventoryError> {
        let system = Arc::clone(&self.system);
        let primed = Arc::clone(&self.primed);

        tokio::task::spawn_blocking(move || Self::capture(&system, &primed))
            .await
            .map_err(|e| InventoryError::Unavailable(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_reports_host_memory() {
        let inventory = SysinfoInventory::new();
        let snapshot = inventory.snapshot().await.unwrap();

        assert!(snapshot.ram_total_gb > 0.0);
        assert!(snapshot.ram_percent >= 0.0 && snapshot.ram_percent <= 100.0);
        assert!(!snapshot.processes.is_empty());
    }
}
