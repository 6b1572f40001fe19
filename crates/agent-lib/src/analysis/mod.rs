//! Analysis engine over the sample history
//!
//! Every stage is a pure function of a `History` snapshot:
//! - Baseline statistics and spike detection
//! - Short-window trend classification
//! - New and persistent suspicious process detection
//! - Risk scoring and recommendations

mod baseline;
mod process_diff;
mod recommendations;
mod report;
mod risk;
mod spike_detector;
mod trend;

pub use baseline::{ram_scalar, Baseline, BaselineStats, OnlineStats, MIN_BASELINE_SAMPLES};
pub use process_diff::{new_processes, ProcessDiffer, SuspicionReason, SuspiciousProcess};
pub use recommendations::{RecommendationGenerator, ALL_CLEAR};
pub use report::{AnalysisReport, Analyzer};
pub use risk::{RiskAssessment, RiskScorer, RiskTier};
pub use spike_detector::{AnomalyFlags, SpikeDetector};
pub use trend::{direction, Direction, TrendAnalyzer, TrendResult};
