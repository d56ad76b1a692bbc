//! Drift detection.
//!
//! - `model` - Events, per-symbol results and scan reports (AdjustmentEvent, ScanResult, ScanReport)
//! - `sampling` - Choice of stored dates to compare
//! - `scoring` - Exact percentage difference and significance
//! - `classifier` - Corporate action heuristics (classify)
//! - `detector` - Sampling, comparison and optional auto-fix (DriftDetector)

mod classifier;
mod detector;
mod model;
mod sampling;
mod scoring;

pub use classifier::{classify, Classification};
pub use detector::DriftDetector;
pub use model::{AdjustmentEvent, EventType, ScanReport, ScanResult, Severity};
pub use sampling::sample_indices;
pub use scoring::{is_significant, pct_difference};
