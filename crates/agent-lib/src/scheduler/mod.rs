//! Scheduling and serialization of analysis runs
//!
//! - `AnalysisService` owns the history and runs the critical section
//! - `AnalysisScheduler` triggers runs on an interval inside a day/time window

mod runner;
mod service;
mod window;

pub use runner::{AnalysisScheduler, SchedulerStats};
pub use service::{AnalysisService, RunError};
pub use window::{ScheduleConfig, ScheduleError, ScheduleWindow, MAX_INTERVAL_MINUTES};
