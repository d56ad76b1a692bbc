//! Coverage orchestration.
//!
//! - `report` - Weekday-aware coverage report over stored rows (CoverageReport)
//! - `ranges` - Fetch range planning and merging
//! - `orchestrator` - Locked, idempotent gap filling per symbol (CoverageOrchestrator)

mod orchestrator;
mod ranges;
mod report;

pub use orchestrator::{
    CoverageOrchestrator, CoverageSummary, Registration, SymbolCoverage, SymbolError,
};
pub use ranges::{merge_ranges, plan_ranges};
pub use report::{count_weekdays, find_first_missing_weekday, CoverageReport};
