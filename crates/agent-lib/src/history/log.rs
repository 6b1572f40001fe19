//! Persistence backends for sample history
//!
//! A backend is read as "all Samples" and written as "replace all Samples".

use crate::models::Sample;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Key-ordered sample log
pub trait SampleLog: Send + Sync {
    /// Read every stored Sample, oldest first; `Ok(None)` when nothing was stored
    fn read_all(&self) -> Result<Option<Vec<Sample>>>;

    /// Replace the stored Samples with `samples`
    fn replace_all(&self, samples: &[Sample]) -> Result<()>;
}

/// Sample log stored as a JSON array in a single file
#[derive(Debug, Clone)]
pub struct JsonFileLog {
    path: PathBuf,
}

impl JsonFileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleLog for JsonFileLog {
    fn read_all(&self) -> Result<Option<Vec<Sample>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open history file {:?}", self.path))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .context("Failed to read history file")?;

        let samples: Vec<Sample> =
            serde_json::from_slice(&data).context("Failed to deserialize history data")?;
        Ok(Some(samples))
    }

    fn replace_all(&self, samples: &[Sample]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        let json = serde_json::to_vec_pretty(samples).context("Failed to serialize history")?;

        // Write atomically using temp file
        let temp_path = self.path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

        file.write_all(&json)
            .context("Failed to write history data")?;
        file.sync_all().context("Failed to sync history file")?;

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, self.path))?;

        debug!(path = %self.path.display(), samples = samples.len(), "History written to disk");
        Ok(())
    }
}

/// In-process sample log
#[derive(Debug, Default)]
pub struct MemoryLog {
    samples: Mutex<Option<Vec<Sample>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(samples: Vec<Sample>) -> Self {
        Self {
            samples: Mutex::new(Some(samples)),
        }
    }
}

impl SampleLog for MemoryLog {
    fn read_all(&self) -> Result<Option<Vec<Sample>>> {
        let guard = self
            .samples
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory log lock poisoned"))?;
        Ok(guard.clone())
    }

    fn replace_all(&self, samples: &[Sample]) -> Result<()> {
        let mut guard = self
            .samples
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory log lock poisoned"))?;
        *guard = Some(samples.to_vec());
        Ok(())
    }
}
