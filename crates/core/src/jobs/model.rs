//! Fetch job domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use pricesync_market_data::DateRange;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job has no symbols")]
    EmptySymbols,

    #[error("Unknown job status: {0}")]
    UnknownStatus(String),
}

/// Job lifecycle.
///
/// ```text
/// pending -> processing -> completed | completed_errors | failed
/// pending | processing -> cancelled
/// ```
///
/// All four end states are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    CompletedErrors,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::CompletedErrors => "completed_errors",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed
                | JobStatus::CompletedErrors
                | JobStatus::Failed
                | JobStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Pending, JobStatus::Processing) => true,
            (JobStatus::Pending | JobStatus::Processing, JobStatus::Cancelled) => true,
            (
                JobStatus::Processing,
                JobStatus::Completed | JobStatus::CompletedErrors | JobStatus::Failed,
            ) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "completed_errors" => Ok(JobStatus::CompletedErrors),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(JobError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOptions {
    pub priority: JobPriority,
    /// Refetch the whole range instead of only the planned gaps
    pub force_overwrite: bool,
    /// Overrides the engine's refetch window for this job
    pub refetch_window_days: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub completed_count: usize,
    pub total_count: usize,
    pub current_symbol: Option<String>,
    pub percent: f64,
}

impl JobProgress {
    pub fn new(total_count: usize) -> Self {
        Self {
            total_count,
            ..Default::default()
        }
    }

    /// Count one finished symbol. Never exceeds `total_count`.
    pub fn record_completion(&mut self) {
        self.completed_count = (self.completed_count + 1).min(self.total_count);
        self.percent = if self.total_count == 0 {
            100.0
        } else {
            (self.completed_count as f64 * 10_000.0 / self.total_count as f64).round() / 100.0
        };
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFetchResult {
    pub symbol: String,
    pub success: bool,
    pub rows_written: usize,
    pub error: Option<String>,
}

impl SymbolFetchResult {
    pub fn success(symbol: &str, rows_written: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            success: true,
            rows_written,
            error: None,
        }
    }

    pub fn failure(symbol: &str, error: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            success: false,
            rows_written: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchJob {
    pub job_id: String,
    pub status: JobStatus,
    pub symbols: Vec<String>,
    pub date_range: DateRange,
    pub progress: JobProgress,
    pub results: Vec<SymbolFetchResult>,
    pub errors: Vec<String>,
    pub options: JobOptions,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FetchJob {
    pub fn new(symbols: Vec<String>, date_range: DateRange, options: JobOptions) -> Self {
        let total = symbols.len();
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            symbols,
            date_range,
            progress: JobProgress::new(total),
            results: Vec::with_capacity(total),
            errors: Vec::new(),
            options,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Move to `next`, stamping start and completion times.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        if next == JobStatus::Processing {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
            self.progress.current_symbol = None;
        }
        self.status = next;
        Ok(())
    }

    /// Record one symbol's outcome and advance progress.
    pub fn record_result(&mut self, result: SymbolFetchResult) {
        if let Some(error) = &result.error {
            self.errors.push(format!("{}: {}", result.symbol, error));
        }
        self.results.push(result);
        self.progress.record_completion();
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Completed when every symbol finished without error.
    pub fn final_status(&self) -> JobStatus {
        if self.error_count() == 0 && self.progress.completed_count == self.progress.total_count {
            JobStatus::Completed
        } else {
            JobStatus::CompletedErrors
        }
    }
}
