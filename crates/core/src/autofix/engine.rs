use std::sync::Arc;

use chrono::{Months, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{COVERAGE_LOCK_PREFIX, DEFAULT_LOOKBACK_YEARS};
use crate::errors::{Error, Result};
use crate::jobs::{FetchJobManager, JobOptions, JobPriority};
use crate::lock::SymbolLocker;
use crate::prices::PriceStore;
use pricesync_market_data::DateRange;

/// Outcome of one auto-fix attempt.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixOutcome {
    pub symbol: String,
    pub deleted_rows: usize,
    pub job_created: bool,
    pub job_id: Option<String>,
    pub date_range: Option<DateRange>,
    pub error: Option<String>,
}

/// Replaces a drifted symbol's history with a fresh full-range fetch.
pub struct AutoFixEngine {
    store: Arc<dyn PriceStore>,
    jobs: Arc<FetchJobManager>,
    locker: Arc<SymbolLocker>,
}

impl AutoFixEngine {
    pub fn new(
        store: Arc<dyn PriceStore>,
        jobs: Arc<FetchJobManager>,
        locker: Arc<SymbolLocker>,
    ) -> Self {
        Self {
            store,
            jobs,
            locker,
        }
    }

    /// Delete every stored row for `symbol` and queue a forced refetch.
    ///
    /// Deletion and job creation succeed or fail together: if the job
    /// cannot be created the deleted rows are written back.
    pub async fn auto_fix(&self, symbol: &str) -> AutoFixOutcome {
        match self.purge_and_reschedule(symbol).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Auto-fix failed for {}: {}", symbol, e);
                AutoFixOutcome {
                    symbol: symbol.to_string(),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    async fn purge_and_reschedule(&self, symbol: &str) -> Result<AutoFixOutcome> {
        let today = Utc::now().date_naive();
        let start = match self.store.date_bounds(symbol)? {
            Some(bounds) => bounds.start.min(today),
            None => today
                .checked_sub_months(Months::new(DEFAULT_LOOKBACK_YEARS as u32 * 12))
                .unwrap_or(today),
        };
        let range = DateRange::new(start, today)
            .ok_or_else(|| Error::Unexpected(format!("Empty refetch range for {}", symbol)))?;

        // The coverage job for this symbol waits on this lock, so it cannot
        // write between the delete and the restore.
        let guard = self
            .locker
            .lock(&format!("{}{}", COVERAGE_LOCK_PREFIX, symbol))
            .await;
        let result = self.replace_locked(symbol, range).await;
        guard.release().await;
        result
    }

    async fn replace_locked(&self, symbol: &str, range: DateRange) -> Result<AutoFixOutcome> {
        let snapshot = self.store.prices_in_range(symbol, None, None)?;
        let deleted_rows = self.store.delete_prices(symbol, None).await?;

        let options = JobOptions {
            priority: JobPriority::High,
            force_overwrite: true,
            refetch_window_days: None,
        };
        match self.jobs.submit(vec![symbol.to_string()], range, options).await {
            Ok(job_id) => {
                info!(
                    "Auto-fix for {}: deleted {} rows, queued job {} over {}",
                    symbol, deleted_rows, job_id, range
                );
                Ok(AutoFixOutcome {
                    symbol: symbol.to_string(),
                    deleted_rows,
                    job_created: true,
                    job_id: Some(job_id),
                    date_range: Some(range),
                    error: None,
                })
            }
            Err(e) => {
                warn!(
                    "Job creation failed for {}, restoring {} rows",
                    symbol,
                    snapshot.len()
                );
                if !snapshot.is_empty() {
                    if let Err(restore) = self.store.upsert_prices(&snapshot).await {
                        error!("Could not restore rows for {}: {}", symbol, restore);
                        return Err(Error::Unexpected(format!(
                            "{}; restore also failed: {}",
                            e, restore
                        )));
                    }
                }
                Err(e)
            }
        }
    }
}
