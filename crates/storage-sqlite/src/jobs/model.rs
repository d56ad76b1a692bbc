//! Database model for fetch jobs.
//!
//! List-valued fields are stored as JSON documents in TEXT columns.

use diesel::prelude::*;

use crate::errors::StorageError;
use crate::utils::{format_date, format_timestamp, parse_date, parse_timestamp};
use pricesync_core::jobs::FetchJob;
use pricesync_market_data::DateRange;

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::fetch_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct FetchJobDB {
    pub id: String,
    pub status: String,
    pub symbols: String,
    pub date_start: String,
    pub date_end: String,
    pub progress: String,
    pub results: String,
    pub errors: String,
    pub options: String,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl TryFrom<&FetchJob> for FetchJobDB {
    type Error = StorageError;

    fn try_from(job: &FetchJob) -> Result<Self, Self::Error> {
        Ok(Self {
            id: job.job_id.clone(),
            status: job.status.as_str().to_string(),
            symbols: serde_json::to_string(&job.symbols)?,
            date_start: format_date(job.date_range.start),
            date_end: format_date(job.date_range.end),
            progress: serde_json::to_string(&job.progress)?,
            results: serde_json::to_string(&job.results)?,
            errors: serde_json::to_string(&job.errors)?,
            options: serde_json::to_string(&job.options)?,
            created_at: format_timestamp(job.created_at),
            started_at: job.started_at.map(format_timestamp),
            completed_at: job.completed_at.map(format_timestamp),
        })
    }
}

impl TryFrom<FetchJobDB> for FetchJob {
    type Error = StorageError;

    fn try_from(db: FetchJobDB) -> Result<Self, Self::Error> {
        let start = parse_date(&db.date_start)?;
        let end = parse_date(&db.date_end)?;
        let date_range = DateRange::new(start, end).ok_or_else(|| {
            StorageError::Corrupt(format!("job {} has range {} > {}", db.id, start, end))
        })?;

        Ok(FetchJob {
            status: db
                .status
                .parse()
                .map_err(|e: pricesync_core::jobs::JobError| StorageError::Corrupt(e.to_string()))?,
            symbols: serde_json::from_str(&db.symbols)?,
            date_range,
            progress: serde_json::from_str(&db.progress)?,
            results: serde_json::from_str(&db.results)?,
            errors: serde_json::from_str(&db.errors)?,
            options: serde_json::from_str(&db.options)?,
            created_at: parse_timestamp(&db.created_at)?,
            started_at: db.started_at.as_deref().map(parse_timestamp).transpose()?,
            completed_at: db.completed_at.as_deref().map(parse_timestamp).transpose()?,
            job_id: db.id,
        })
    }
}
