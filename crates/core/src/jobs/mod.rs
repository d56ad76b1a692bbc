//! Background fetch jobs.
//!
//! - `model` - Job record, status machine and progress (FetchJob, JobStatus)
//! - `store` - Job persistence trait (JobStore)
//! - `manager` - Submission, bounded execution and cancellation (FetchJobManager)

mod manager;
mod model;
mod store;

pub use manager::FetchJobManager;
pub use model::{
    FetchJob, JobError, JobOptions, JobPriority, JobProgress, JobStatus, SymbolFetchResult,
};
pub use store::JobStore;
