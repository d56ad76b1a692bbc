//! In-memory stores and a scripted price source shared by unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::errors::{DatabaseError, Error, Result};
use crate::jobs::{FetchJob, JobStatus, JobStore};
use crate::prices::{CoverageBounds, PriceRecord, PriceStore, SymbolStateStore};
use pricesync_market_data::{
    Backoff, ClientConfig, CorporateActions, DateRange, FetchClient, MarketDataError, PriceBar,
    PriceSource, RateLimitConfig,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn is_weekday(day: NaiveDate) -> bool {
    !matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_weekday(*d))
        .collect()
}

pub fn record_with_close(symbol: &str, day: NaiveDate, close: Decimal) -> PriceRecord {
    PriceRecord {
        symbol: symbol.to_string(),
        date: day,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000,
        source: "MOCK".to_string(),
        last_updated: Utc::now(),
    }
}

pub fn record(symbol: &str, day: NaiveDate) -> PriceRecord {
    record_with_close(symbol, day, dec!(100))
}

pub fn bar(day: NaiveDate, close: Decimal) -> PriceBar {
    PriceBar::ohlcv(day, close, close, close, close, 1_000)
}

/// A bar whose dividend-adjusted close differs from its close, as Yahoo
/// reports for any symbol that paid a dividend later on.
pub fn dividend_adjusted_bar(day: NaiveDate, close: Decimal, adj_close: Decimal) -> PriceBar {
    let mut bar = bar(day, close);
    bar.adj_close = Some(adj_close);
    bar
}

// =============================================================================
// Price store
// =============================================================================

#[derive(Clone, Default)]
pub struct InMemoryPriceStore {
    rows: Arc<Mutex<BTreeMap<(String, NaiveDate), PriceRecord>>>,
    fail_on_upsert: Arc<AtomicBool>,
    fail_on_delete: Arc<AtomicBool>,
    stored_dates_calls: Arc<AtomicUsize>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, records: Vec<PriceRecord>) {
        let mut rows = self.rows.lock().unwrap();
        for r in records {
            rows.insert((r.symbol.clone(), r.date), r);
        }
    }

    pub fn seed_weekdays(&self, symbol: &str, start: NaiveDate, end: NaiveDate) {
        self.insert(weekdays(start, end).into_iter().map(|d| record(symbol, d)).collect());
    }

    pub fn remove(&self, symbol: &str, day: NaiveDate) {
        self.rows.lock().unwrap().remove(&(symbol.to_string(), day));
    }

    pub fn rows_for(&self, symbol: &str) -> Vec<PriceRecord> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.symbol == symbol)
            .cloned()
            .collect()
    }

    pub fn set_fail_on_upsert(&self, fail: bool) {
        self.fail_on_upsert.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_delete(&self, fail: bool) {
        self.fail_on_delete.store(fail, Ordering::SeqCst);
    }

    pub fn stored_dates_calls(&self) -> usize {
        self.stored_dates_calls.load(Ordering::SeqCst)
    }

    fn in_range(r: &PriceRecord, symbol: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        r.symbol == symbol
            && start.map_or(true, |s| r.date >= s)
            && end.map_or(true, |e| r.date <= e)
    }
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn upsert_prices(&self, records: &[PriceRecord]) -> Result<usize> {
        if self.fail_on_upsert.load(Ordering::SeqCst) {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "Intentional upsert failure".into(),
            )));
        }
        let mut rows = self.rows.lock().unwrap();
        let mut written = 0;
        for r in records {
            let key = (r.symbol.clone(), r.date);
            let changed = rows.get(&key).map_or(true, |old| !old.same_values(r));
            if changed {
                rows.insert(key, r.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn delete_prices(&self, symbol: &str, range: Option<DateRange>) -> Result<usize> {
        if self.fail_on_delete.load(Ordering::SeqCst) {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "Intentional delete failure".into(),
            )));
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        let (start, end) = (range.map(|r| r.start), range.map(|r| r.end));
        rows.retain(|_, r| !Self::in_range(r, symbol, start, end));
        Ok(before - rows.len())
    }

    fn coverage_bounds(&self, symbol: &str, range: DateRange) -> Result<Option<CoverageBounds>> {
        let dates = self.stored_dates_inner(symbol, range);
        Ok(match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => Some(CoverageBounds {
                first_date: *first,
                last_date: *last,
                row_count: dates.len() as i64,
            }),
            _ => None,
        })
    }

    fn stored_dates(&self, symbol: &str, range: DateRange) -> Result<Vec<NaiveDate>> {
        self.stored_dates_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.stored_dates_inner(symbol, range))
    }

    fn prices_in_range(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| Self::in_range(r, symbol, start, end))
            .cloned()
            .collect())
    }

    fn date_bounds(&self, symbol: &str) -> Result<Option<DateRange>> {
        let rows = self.rows_for(symbol);
        Ok(match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => DateRange::new(first.date, last.date),
            _ => None,
        })
    }

    fn list_symbols(&self) -> Result<Vec<String>> {
        let mut symbols: Vec<String> = self
            .rows
            .lock()
            .unwrap()
            .keys()
            .map(|(s, _)| s.clone())
            .collect();
        symbols.dedup();
        Ok(symbols)
    }
}

impl InMemoryPriceStore {
    fn stored_dates_inner(&self, symbol: &str, range: DateRange) -> Vec<NaiveDate> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| Self::in_range(r, symbol, Some(range.start), Some(range.end)))
            .map(|r| r.date)
            .collect()
    }
}

// =============================================================================
// Symbol state store
// =============================================================================

#[derive(Default)]
pub struct InMemoryStateStore {
    bootstrapped: Mutex<HashSet<String>>,
}

#[async_trait]
impl SymbolStateStore for InMemoryStateStore {
    fn is_bootstrapped(&self, symbol: &str) -> Result<bool> {
        Ok(self.bootstrapped.lock().unwrap().contains(symbol))
    }

    async fn mark_bootstrapped(&self, symbol: &str) -> Result<()> {
        self.bootstrapped.lock().unwrap().insert(symbol.to_string());
        Ok(())
    }
}

// =============================================================================
// Job store
// =============================================================================

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, FetchJob>>,
    fail_on_create: AtomicBool,
    fail_next_update: AtomicBool,
    /// Every snapshot written through `update_job`, in order
    pub history: Mutex<Vec<FetchJob>>,
}

impl InMemoryJobStore {
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Fail only the next `update_job` call.
    pub fn set_fail_next_update(&self, fail: bool) {
        self.fail_next_update.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: &FetchJob) -> Result<()> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "Intentional create failure".into(),
            )));
        }
        self.jobs
            .lock()
            .unwrap()
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &FetchJob) -> Result<()> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "Intentional update failure".into(),
            )));
        }
        self.history.lock().unwrap().push(job.clone());
        self.jobs
            .lock()
            .unwrap()
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn purge_finished(&self, before: DateTime<Utc>) -> Result<usize> {
        let mut jobs = self.jobs.lock().unwrap();
        let count = jobs.len();
        jobs.retain(|_, j| {
            !(j.status.is_terminal() && j.completed_at.is_some_and(|at| at < before))
        });
        Ok(count - jobs.len())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<FetchJob>> {
        Ok(self.jobs.lock().unwrap().get(job_id).cloned())
    }

    fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<FetchJob>> {
        let mut jobs: Vec<FetchJob> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }
}

// =============================================================================
// Price source
// =============================================================================

/// Source serving fixed bars and corporate actions per symbol.
#[derive(Default)]
pub struct MockSource {
    history: Mutex<HashMap<String, Vec<PriceBar>>>,
    actions: Mutex<HashMap<String, CorporateActions>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
    /// Every history request as (symbol, range)
    pub calls: Mutex<Vec<(String, DateRange)>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_history(&self, symbol: &str, bars: Vec<PriceBar>) {
        self.history
            .lock()
            .unwrap()
            .insert(symbol.to_string(), bars);
    }

    /// Weekday bars in `[start, end]` all closing at `close`.
    pub fn set_weekday_history(&self, symbol: &str, start: NaiveDate, end: NaiveDate, close: Decimal) {
        self.set_history(
            symbol,
            weekdays(start, end).into_iter().map(|d| bar(d, close)).collect(),
        );
    }

    pub fn set_actions(&self, symbol: &str, actions: CorporateActions) {
        self.actions
            .lock()
            .unwrap()
            .insert(symbol.to_string(), actions);
    }

    pub fn fail_symbol(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn history_calls(&self) -> Vec<(String, DateRange)> {
        self.calls.lock().unwrap().clone()
    }

    fn check_symbol(&self, symbol: &str) -> std::result::Result<(), MarketDataError> {
        if self.failing.lock().unwrap().contains(symbol) {
            return Err(MarketDataError::ProviderError {
                provider: "MOCK".to_string(),
                message: "scripted failure".to_string(),
            });
        }
        if !self.history.lock().unwrap().contains_key(symbol) {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceSource for MockSource {
    fn id(&self) -> &'static str {
        "MOCK"
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<PriceBar>, MarketDataError> {
        self.calls.lock().unwrap().push((
            symbol.to_string(),
            DateRange { start, end },
        ));
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check_symbol(symbol)?;

        let bars: Vec<PriceBar> = self
            .history
            .lock()
            .unwrap()
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if bars.is_empty() {
            Err(MarketDataError::NoDataForRange)
        } else {
            Ok(bars)
        }
    }

    async fn fetch_corporate_actions(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> std::result::Result<CorporateActions, MarketDataError> {
        self.check_symbol(symbol)?;
        Ok(self
            .actions
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }
}

/// Client with no retries and an effectively unlimited rate.
pub fn test_client(source: Arc<dyn PriceSource>) -> Arc<FetchClient> {
    Arc::new(FetchClient::new(
        source,
        ClientConfig {
            timeout: Duration::from_secs(5),
            workers: 8,
            rate_limit: RateLimitConfig::new(10_000.0, 10_000.0),
            backoff: Backoff::new(Duration::from_millis(1), 2.0, Duration::from_millis(2), 0),
        },
    ))
}
