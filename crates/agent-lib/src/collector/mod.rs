//! Process inventory collection
//!
//! This module defines the boundary to the host's process inventory and the
//! builder that turns one raw inventory snapshot into a normalized Sample.

mod sample_builder;
mod sysinfo_inventory;

pub use sample_builder::{BuildOutcome, SampleBuilder};
pub use sysinfo_inventory::SysinfoInventory;

use crate::models::InventorySnapshot;

pub use async_trait::async_trait;

/// Total failure to obtain a process inventory
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("process inventory unavailable: {0}")]
    Unavailable(String),
    #[error("failed to refresh host metrics: {0}")]
    Refresh(String),
}

/// Trait for process inventory providers
///
/// Individual unreadable processes are reported inside the snapshot as
/// skipped entries; an `Err` means no inventory could be obtained at all.
#[async_trait]
pub trait ProcessInventory: Send + Sync {
    /// Capture host metrics and the process list for the current instant
    async fn snapshot(&self) -> Result<InventorySnapshot, InventoryError>;
}
