use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{FetchJob, JobStatus};
use crate::errors::Result;

/// Persistence for fetch jobs.
///
/// Terminal jobs stay stored until `purge_finished` removes them.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &FetchJob) -> Result<()>;

    /// Overwrite a stored job with the given snapshot.
    async fn update_job(&self, job: &FetchJob) -> Result<()>;

    /// Delete terminal jobs that completed before `before`.
    ///
    /// Returns the number of deleted jobs.
    async fn purge_finished(&self, before: DateTime<Utc>) -> Result<usize>;

    fn get_job(&self, job_id: &str) -> Result<Option<FetchJob>>;

    /// Jobs newest first, optionally filtered by status.
    fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<FetchJob>>;
}
