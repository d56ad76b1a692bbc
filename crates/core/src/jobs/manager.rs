//! Background fetch jobs.
//!
//! A job is created synchronously by `submit` and then driven on its own
//! tokio task. Symbols run concurrently up to `max_concurrent_fetches`;
//! every progress change goes through the job's mutex and is persisted
//! while the mutex is held, so stored snapshots never go backwards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use super::model::{FetchJob, JobError, JobOptions, JobStatus, SymbolFetchResult};
use super::store::JobStore;
use crate::coverage::CoverageOrchestrator;
use crate::errors::{Error, Result};
use pricesync_market_data::DateRange;

type LiveJobs = DashMap<String, Arc<Mutex<FetchJob>>>;

pub struct FetchJobManager {
    store: Arc<dyn JobStore>,
    orchestrator: Arc<CoverageOrchestrator>,
    live: Arc<LiveJobs>,
}

impl FetchJobManager {
    pub fn new(store: Arc<dyn JobStore>, orchestrator: Arc<CoverageOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
            live: Arc::new(DashMap::new()),
        }
    }

    /// Create a pending job and start it in the background.
    pub async fn submit(
        &self,
        symbols: Vec<String>,
        date_range: DateRange,
        options: JobOptions,
    ) -> Result<String> {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return Err(JobError::EmptySymbols.into());
        }

        let job = FetchJob::new(symbols, date_range, options);
        self.store.create_job(&job).await?;

        let job_id = job.job_id.clone();
        info!(
            "Submitted job {} for {} symbol(s) over {} ({:?} priority)",
            job_id,
            job.symbols.len(),
            date_range,
            job.options.priority
        );

        let handle = Arc::new(Mutex::new(job));
        self.live.insert(job_id.clone(), handle.clone());

        let runner = JobRunner {
            store: self.store.clone(),
            orchestrator: self.orchestrator.clone(),
            live: self.live.clone(),
            job: handle,
        };
        tokio::spawn(runner.run());

        Ok(job_id)
    }

    /// Current snapshot of a job, live or persisted.
    pub async fn get_status(&self, job_id: &str) -> Result<FetchJob> {
        let live = self.live.get(job_id).map(|entry| entry.value().clone());
        if let Some(handle) = live {
            return Ok(handle.lock().await.clone());
        }
        self.store
            .get_job(job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()).into())
    }

    /// Request cancellation. Returns false when the job already finished.
    ///
    /// Symbols already in flight run to completion; no new symbol starts.
    pub async fn cancel(&self, job_id: &str) -> Result<bool> {
        let live = self.live.get(job_id).map(|entry| entry.value().clone());
        if let Some(handle) = live {
            let mut job = handle.lock().await;
            return self.cancel_locked(&mut job).await;
        }

        let mut job = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| Error::from(JobError::NotFound(job_id.to_string())))?;
        self.cancel_locked(&mut job).await
    }

    pub fn list(&self, status: Option<JobStatus>) -> Result<Vec<FetchJob>> {
        self.store.list_jobs(status)
    }

    /// Drop terminal jobs that completed before `before`.
    pub async fn purge(&self, before: DateTime<Utc>) -> Result<usize> {
        let purged = self.store.purge_finished(before).await?;
        debug!("Purged {} finished job(s)", purged);
        Ok(purged)
    }

    async fn cancel_locked(&self, job: &mut FetchJob) -> Result<bool> {
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.transition(JobStatus::Cancelled)?;
        self.store.update_job(job).await?;
        info!("Cancelled job {}", job.job_id);
        Ok(true)
    }
}

fn normalize_symbols(symbols: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    symbols
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

/// Everything the background task needs, detached from the manager.
#[derive(Clone)]
struct JobRunner {
    store: Arc<dyn JobStore>,
    orchestrator: Arc<CoverageOrchestrator>,
    live: Arc<LiveJobs>,
    job: Arc<Mutex<FetchJob>>,
}

impl JobRunner {
    async fn run(self) {
        let job_id = self.job.lock().await.job_id.clone();

        if let Err(e) = self.execute().await {
            error!("Job {} failed: {}", job_id, e);
            self.fail(&e).await;
        }

        self.live.remove(&job_id);
    }

    async fn execute(&self) -> Result<()> {
        let (symbols, range, options) = {
            let mut job = self.job.lock().await;
            if job.status == JobStatus::Cancelled {
                return Ok(());
            }
            job.transition(JobStatus::Processing)?;
            self.store.update_job(&job).await?;
            (job.symbols.clone(), job.date_range, job.options.clone())
        };

        let config = self.orchestrator.config();
        let window = options
            .refetch_window_days
            .unwrap_or(config.refetch_window_days);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));
        let mut tasks = JoinSet::new();

        for symbol in symbols {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Unexpected(e.to_string()))?;

            {
                let mut job = self.job.lock().await;
                if job.status == JobStatus::Cancelled {
                    debug!("Job {} cancelled before {}", job.job_id, symbol);
                    break;
                }
                job.progress.current_symbol = Some(symbol.clone());
            }

            let runner = self.clone();
            let force = options.force_overwrite;
            tasks.spawn(async move {
                let _permit = permit;
                let result = match runner
                    .orchestrator
                    .ensure_symbol(&symbol, range, window, force)
                    .await
                {
                    Ok(coverage) => SymbolFetchResult::success(&symbol, coverage.rows_written),
                    Err(e) => {
                        warn!("Fetch failed for {}: {}", symbol, e);
                        SymbolFetchResult::failure(&symbol, e.to_string())
                    }
                };

                let mut job = runner.job.lock().await;
                job.record_result(result);
                runner.store.update_job(&job).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| Error::Unexpected(format!("Symbol task aborted: {}", e)))??;
        }

        let mut job = self.job.lock().await;
        if job.status == JobStatus::Cancelled {
            return Ok(());
        }
        let status = job.final_status();
        job.transition(status)?;
        self.store.update_job(&job).await?;
        info!(
            "Job {} finished as {} ({} error(s))",
            job.job_id,
            status,
            job.error_count()
        );
        Ok(())
    }

    /// Mark the job failed with a synthetic failure for every symbol.
    async fn fail(&self, cause: &Error) {
        let mut job = self.job.lock().await;
        if job.status.is_terminal() {
            return;
        }
        let message = format!("Job aborted: {}", cause);
        job.results = job
            .symbols
            .iter()
            .map(|symbol| SymbolFetchResult::failure(symbol, message.clone()))
            .collect();
        job.errors = job
            .symbols
            .iter()
            .map(|symbol| format!("{}: {}", symbol, message))
            .collect();

        if job.status == JobStatus::Pending {
            // Failed is only reachable from processing
            job.status = JobStatus::Processing;
        }
        if let Err(e) = job.transition(JobStatus::Failed) {
            error!("Could not mark job {} failed: {}", job.job_id, e);
            return;
        }
        if let Err(e) = self.store.update_job(&job).await {
            error!("Could not persist failed job {}: {}", job.job_id, e);
        }
    }
}
