//! Pricesync Core - Coverage and drift engine for daily price history.
//!
//! Keeps a price store in step with an external source: fills missing
//! dates, detects stored prices invalidated by later corporate actions,
//! and schedules refetches as background jobs. The crate is
//! database-agnostic and defines traits implemented by the
//! `storage-sqlite` crate.

pub mod autofix;
pub mod cache;
pub mod config;
pub mod constants;
pub mod coverage;
pub mod drift;
pub mod errors;
pub mod jobs;
pub mod lock;
pub mod prices;

#[cfg(test)]
mod test_support;

pub use autofix::{AutoFixEngine, AutoFixOutcome};
pub use cache::{Cache, CacheBackend, LocalCache};
pub use config::{DriftThresholds, EngineConfig};
pub use coverage::{CoverageOrchestrator, CoverageReport, CoverageSummary, Registration};
pub use drift::{AdjustmentEvent, DriftDetector, EventType, ScanReport, ScanResult, Severity};
pub use jobs::{FetchJob, FetchJobManager, JobOptions, JobStatus, JobStore};
pub use lock::{InProcessLockBackend, LockBackend, SymbolLocker};
pub use prices::{PriceRecord, PriceStore, SymbolStateStore};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
