use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::{debug, info};
use std::sync::Arc;

use super::model::FetchJobDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::fetch_jobs::dsl as jobs_dsl;
use crate::utils::format_timestamp;
use pricesync_core::errors::{DatabaseError, Error};
use pricesync_core::jobs::{FetchJob, JobStatus, JobStore};
use pricesync_core::Result;

const TERMINAL_STATUSES: [JobStatus; 4] = [
    JobStatus::Completed,
    JobStatus::CompletedErrors,
    JobStatus::Failed,
    JobStatus::Cancelled,
];

pub struct FetchJobRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl FetchJobRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl JobStore for FetchJobRepository {
    async fn create_job(&self, job: &FetchJob) -> Result<()> {
        let row = FetchJobDB::try_from(job)?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(jobs_dsl::fetch_jobs)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn update_job(&self, job: &FetchJob) -> Result<()> {
        let row = FetchJobDB::try_from(job)?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let updated = diesel::update(jobs_dsl::fetch_jobs.find(&row.id))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if updated == 0 {
                    return Err(Error::Database(DatabaseError::NotFound(format!(
                        "fetch job {}",
                        row.id
                    ))));
                }
                Ok(())
            })
            .await
    }

    async fn purge_finished(&self, before: DateTime<Utc>) -> Result<usize> {
        let cutoff = format_timestamp(before);
        let statuses: Vec<&'static str> = TERMINAL_STATUSES.iter().map(|s| s.as_str()).collect();

        let purged = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let purged = diesel::delete(
                    jobs_dsl::fetch_jobs
                        .filter(jobs_dsl::status.eq_any(statuses))
                        .filter(jobs_dsl::completed_at.lt(cutoff)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(purged)
            })
            .await?;

        if purged > 0 {
            info!("Purged {} finished fetch jobs", purged);
        }
        Ok(purged)
    }

    fn get_job(&self, job_id: &str) -> Result<Option<FetchJob>> {
        let mut conn = get_connection(&self.pool)?;

        let row: Option<FetchJobDB> = jobs_dsl::fetch_jobs
            .find(job_id)
            .select(FetchJobDB::as_select())
            .first(&mut conn)
            .optional()
            .into_core()?;

        row.map(FetchJob::try_from).transpose().into_core()
    }

    fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<FetchJob>> {
        let mut conn = get_connection(&self.pool)?;

        let mut query = jobs_dsl::fetch_jobs.into_boxed();
        if let Some(status) = status {
            query = query.filter(jobs_dsl::status.eq(status.as_str()));
        }

        let rows: Vec<FetchJobDB> = query
            .select(FetchJobDB::as_select())
            .order((jobs_dsl::created_at.desc(), jobs_dsl::id.desc()))
            .load(&mut conn)
            .into_core()?;
        debug!("Loaded {} fetch jobs", rows.len());

        rows.into_iter()
            .map(|row| FetchJob::try_from(row).into_core())
            .collect()
    }
}
