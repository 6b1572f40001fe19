//! Bounded sample history and its persistence
//!
//! This module provides:
//! - `History`, an ordered FIFO-evicting sequence of Samples
//! - `SampleLog` backends (JSON file, in-memory)
//! - `HistoryStore`, which loads and saves a History through a backend

mod log;
mod store;

pub use log::{JsonFileLog, MemoryLog, SampleLog};
pub use store::{History, HistoryStore, DEFAULT_CAPACITY};
