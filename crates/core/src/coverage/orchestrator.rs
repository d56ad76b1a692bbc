//! Coverage orchestrator.
//!
//! Brings a symbol's stored rows up to date for a requested range:
//!
//! ```text
//! lock(symbol)
//!   -> bootstrap full history once (optional)
//!   -> CoverageReport -> plan_ranges -> merge_ranges
//!   -> fetch each range -> validate -> idempotent upsert
//! release(symbol)
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::ranges::{merge_ranges, plan_ranges};
use super::report::CoverageReport;
use crate::config::EngineConfig;
use crate::constants::{COVERAGE_LOCK_PREFIX, MAX_COVERAGE_CHUNK};
use crate::errors::{Error, Result};
use crate::lock::SymbolLocker;
use crate::prices::{PriceRecord, PriceStore, SymbolStateStore};
use pricesync_market_data::{DateRange, FetchClient, MarketDataError};

/// Outcome of covering one symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolCoverage {
    pub symbol: String,
    /// Merged ranges that were fetched, bootstrap excluded
    pub ranges: Vec<DateRange>,
    /// Rows inserted or changed
    pub rows_written: usize,
    /// Rows dropped for missing fields or broken invariants
    pub rows_rejected: usize,
    pub bootstrapped: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolError {
    pub symbol: String,
    pub message: String,
}

/// Per-symbol successes and failures of a multi-symbol pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub symbols: Vec<SymbolCoverage>,
    pub errors: Vec<SymbolError>,
}

impl CoverageSummary {
    pub fn rows_written(&self) -> usize {
        self.symbols.iter().map(|s| s.rows_written).sum()
    }

    fn push(&mut self, symbol: &str, result: Result<SymbolCoverage>) {
        match result {
            Ok(coverage) => self.symbols.push(coverage),
            Err(e) => {
                error!("Coverage failed for {}: {}", symbol, e);
                self.errors.push(SymbolError {
                    symbol: symbol.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Result of registering a new symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Registration {
    Success { symbol: String, rows_written: usize },
    /// The symbol is malformed or does not exist upstream
    ValidationFailed { symbol: String, reason: String },
    /// The symbol exists but loading it failed
    RegistrationFailed { symbol: String, reason: String },
}

pub struct CoverageOrchestrator {
    store: Arc<dyn PriceStore>,
    state: Arc<dyn SymbolStateStore>,
    client: Arc<FetchClient>,
    locker: Arc<SymbolLocker>,
    config: EngineConfig,
}

impl CoverageOrchestrator {
    pub fn new(
        store: Arc<dyn PriceStore>,
        state: Arc<dyn SymbolStateStore>,
        client: Arc<FetchClient>,
        locker: Arc<SymbolLocker>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            state,
            client,
            locker,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cover each symbol in turn. Failures are collected, never propagated.
    pub async fn ensure_coverage(
        &self,
        symbols: &[String],
        range: DateRange,
        refetch_window_days: i64,
    ) -> CoverageSummary {
        let mut summary = CoverageSummary::default();
        for symbol in symbols {
            let result = self
                .ensure_symbol(symbol, range, refetch_window_days, false)
                .await;
            summary.push(symbol, result);
        }
        summary
    }

    /// Cover symbols in concurrent chunks of `min(10, max_concurrent_fetches)`.
    pub async fn ensure_coverage_parallel(
        &self,
        symbols: &[String],
        range: DateRange,
        refetch_window_days: i64,
    ) -> CoverageSummary {
        let chunk_size = MAX_COVERAGE_CHUNK
            .min(self.config.max_concurrent_fetches)
            .max(1);
        let mut summary = CoverageSummary::default();

        for chunk in symbols.chunks(chunk_size) {
            let results = join_all(
                chunk
                    .iter()
                    .map(|symbol| self.ensure_symbol(symbol, range, refetch_window_days, false)),
            )
            .await;
            for (symbol, result) in chunk.iter().zip(results) {
                summary.push(symbol, result);
            }
        }
        summary
    }

    /// Cover one symbol while holding its lock.
    ///
    /// With `force_overwrite` the whole range is refetched instead of only
    /// the planned gaps.
    pub async fn ensure_symbol(
        &self,
        symbol: &str,
        range: DateRange,
        refetch_window_days: i64,
        force_overwrite: bool,
    ) -> Result<SymbolCoverage> {
        let guard = self
            .locker
            .lock(&format!("{}{}", COVERAGE_LOCK_PREFIX, symbol))
            .await;
        let result = self
            .ensure_symbol_locked(symbol, range, refetch_window_days, force_overwrite)
            .await;
        guard.release().await;
        result
    }

    /// Validate and load a symbol seen for the first time.
    pub async fn register_symbol(&self, symbol: &str) -> Registration {
        let symbol = symbol.trim().to_uppercase();
        if let Err(reason) = validate_symbol(&symbol) {
            return Registration::ValidationFailed { symbol, reason };
        }

        let today = Utc::now().date_naive();
        let start = today - Duration::days(self.config.refetch_window_days.max(1));
        let range = DateRange { start, end: today };

        match self
            .ensure_symbol(&symbol, range, self.config.refetch_window_days, false)
            .await
        {
            Ok(coverage) => {
                info!(
                    "Registered {} ({} rows written)",
                    symbol, coverage.rows_written
                );
                Registration::Success {
                    symbol,
                    rows_written: coverage.rows_written,
                }
            }
            Err(Error::MarketData(e)) if e.is_permanent() => Registration::ValidationFailed {
                symbol,
                reason: e.to_string(),
            },
            Err(e) => Registration::RegistrationFailed {
                symbol,
                reason: e.to_string(),
            },
        }
    }

    async fn ensure_symbol_locked(
        &self,
        symbol: &str,
        range: DateRange,
        refetch_window_days: i64,
        force_overwrite: bool,
    ) -> Result<SymbolCoverage> {
        let mut coverage = SymbolCoverage {
            symbol: symbol.to_string(),
            ..Default::default()
        };

        if self.config.full_history_check {
            if let Some((written, rejected)) = self.bootstrap_if_needed(symbol).await? {
                coverage.bootstrapped = true;
                coverage.rows_written += written;
                coverage.rows_rejected += rejected;
            }
        }

        coverage.ranges = if force_overwrite {
            vec![range]
        } else {
            let report = CoverageReport::compute(self.store.as_ref(), symbol, range)?;
            merge_ranges(plan_ranges(&report, range, refetch_window_days), range)
        };

        debug!("Coverage plan for {}: {:?}", symbol, coverage.ranges);

        for fetch_range in &coverage.ranges {
            let (written, rejected) = self.fetch_and_store(symbol, *fetch_range).await?;
            coverage.rows_written += written;
            coverage.rows_rejected += rejected;
        }

        Ok(coverage)
    }

    /// Load the symbol's entire history the first time it is seen.
    ///
    /// Runs under the symbol lock so concurrent first sightings load once.
    async fn bootstrap_if_needed(&self, symbol: &str) -> Result<Option<(usize, usize)>> {
        if self.state.is_bootstrapped(symbol)? {
            return Ok(None);
        }

        let today = Utc::now().date_naive();
        let earliest = self.client.earliest_date().min(today);
        info!("Bootstrapping full history for {} from {}", symbol, earliest);

        let full = DateRange {
            start: earliest,
            end: today,
        };
        let outcome = self.fetch_and_store(symbol, full).await?;
        self.state.mark_bootstrapped(symbol).await?;
        Ok(Some(outcome))
    }

    /// Fetch one range and upsert the usable rows.
    ///
    /// Returns (rows written, rows rejected).
    async fn fetch_and_store(&self, symbol: &str, range: DateRange) -> Result<(usize, usize)> {
        let bars = match self.client.fetch_history(symbol, range).await {
            Ok(bars) => bars,
            Err(MarketDataError::NoDataForRange) => {
                debug!("No data for {} in {}", symbol, range);
                return Ok((0, 0));
            }
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        let source = self.client.source_id();
        let mut rejected = 0;
        let mut rows = Vec::with_capacity(bars.len());

        for bar in &bars {
            let Some(record) = PriceRecord::from_bar(symbol, bar, source, now) else {
                debug!("Skipping incomplete row for {} on {}", symbol, bar.date);
                rejected += 1;
                continue;
            };
            let violations = record.validate();
            if !violations.is_empty() {
                warn!(
                    "Skipping invalid row for {} on {}: {}",
                    symbol,
                    record.date,
                    violations.join("; ")
                );
                rejected += 1;
                continue;
            }
            rows.push(record);
        }

        if rows.is_empty() {
            return Ok((0, rejected));
        }

        let written = self.store.upsert_prices(&rows).await?;
        debug!(
            "Stored {} of {} rows for {} in {}",
            written,
            rows.len(),
            symbol,
            range
        );
        Ok((written, rejected))
    }
}

fn validate_symbol(symbol: &str) -> std::result::Result<(), String> {
    if symbol.is_empty() {
        return Err("Symbol is empty".to_string());
    }
    if symbol.len() > 32 {
        return Err(format!("Symbol '{}' is too long", symbol));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '=' | '^'))
    {
        return Err(format!("Symbol '{}' contains invalid characters", symbol));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{InProcessLockBackend, LockBackend};
    use crate::test_support::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<InMemoryPriceStore>,
        state: Arc<InMemoryStateStore>,
        source: Arc<MockSource>,
        orchestrator: CoverageOrchestrator,
    }

    fn fixture(full_history_check: bool) -> Fixture {
        let store = Arc::new(InMemoryPriceStore::new());
        let state = Arc::new(InMemoryStateStore::default());
        let source = Arc::new(MockSource::new());
        let backend: Arc<dyn LockBackend> = Arc::new(InProcessLockBackend::new());
        let locker = Arc::new(SymbolLocker::new(
            backend,
            std::time::Duration::from_secs(5),
        ));
        let config = EngineConfig {
            full_history_check,
            ..Default::default()
        };
        let orchestrator = CoverageOrchestrator::new(
            store.clone(),
            state.clone(),
            test_client(source.clone()),
            locker,
            config,
        );
        Fixture {
            store,
            state,
            source,
            orchestrator,
        }
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange::new(start, end).unwrap()
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_initial_load_then_idempotent() {
        let f = fixture(false);
        f.source
            .set_weekday_history("AAPL", date(2020, 1, 1), date(2020, 1, 31), dec!(300));
        let request = range(date(2020, 1, 1), date(2020, 1, 31));

        let first = f
            .orchestrator
            .ensure_coverage(&symbols(&["AAPL"]), request, 7)
            .await;
        assert!(first.errors.is_empty());
        assert_eq!(first.rows_written(), 23);

        let second = f
            .orchestrator
            .ensure_coverage(&symbols(&["AAPL"]), request, 7)
            .await;
        assert!(second.errors.is_empty());
        assert_eq!(second.rows_written(), 0);
    }

    #[tokio::test]
    async fn test_recent_refresh_fetches_single_merged_range() {
        let f = fixture(false);
        f.store
            .seed_weekdays("AAPL", date(2020, 1, 2), date(2020, 1, 10));
        f.source
            .set_weekday_history("AAPL", date(2020, 1, 1), date(2020, 1, 31), dec!(100));

        let coverage = f
            .orchestrator
            .ensure_symbol("AAPL", range(date(2020, 1, 2), date(2020, 1, 15)), 7, false)
            .await
            .unwrap();

        assert_eq!(
            coverage.ranges,
            vec![range(date(2020, 1, 3), date(2020, 1, 15))]
        );
        assert_eq!(f.source.history_calls().len(), 1);
        // 01-13, 01-14 and 01-15 are new; older rows are unchanged
        assert_eq!(coverage.rows_written, 3);
    }

    #[tokio::test]
    async fn test_gap_is_filled() {
        let f = fixture(false);
        f.store
            .seed_weekdays("AAPL", date(2020, 1, 2), date(2020, 1, 10));
        f.store.remove("AAPL", date(2020, 1, 7));
        f.source
            .set_weekday_history("AAPL", date(2020, 1, 1), date(2020, 1, 31), dec!(100));

        let coverage = f
            .orchestrator
            .ensure_symbol("AAPL", range(date(2020, 1, 2), date(2020, 1, 10)), 7, false)
            .await
            .unwrap();

        assert_eq!(coverage.rows_written, 1);
        assert_eq!(f.store.rows_for("AAPL").len(), 7);
    }

    #[tokio::test]
    async fn test_history_before_oldest_row_is_fetched() {
        let f = fixture(false);
        f.store
            .seed_weekdays("AAPL", date(2020, 1, 2), date(2020, 1, 10));
        f.source
            .set_weekday_history("AAPL", date(2019, 12, 2), date(2020, 1, 10), dec!(100));

        let coverage = f
            .orchestrator
            .ensure_symbol("AAPL", range(date(2019, 12, 2), date(2020, 1, 10)), 7, false)
            .await
            .unwrap();

        assert_eq!(
            coverage.ranges,
            vec![range(date(2019, 12, 2), date(2020, 1, 2))]
        );
        // December 2019 has 22 weekdays and 2020-01-01 is a Wednesday
        assert_eq!(coverage.rows_written, 23);
        assert_eq!(f.store.rows_for("AAPL").len(), 30);

        let again = f
            .orchestrator
            .ensure_symbol("AAPL", range(date(2019, 12, 2), date(2020, 1, 10)), 7, false)
            .await
            .unwrap();
        assert!(again.ranges.is_empty());
    }

    #[tokio::test]
    async fn test_leading_hole_and_interior_gap_fill_in_one_pass() {
        let f = fixture(false);
        f.store
            .seed_weekdays("AAPL", date(2020, 1, 2), date(2020, 1, 10));
        f.store.remove("AAPL", date(2020, 1, 7));
        f.source
            .set_weekday_history("AAPL", date(2019, 12, 2), date(2020, 1, 10), dec!(100));

        let coverage = f
            .orchestrator
            .ensure_symbol("AAPL", range(date(2019, 12, 30), date(2020, 1, 10)), 7, false)
            .await
            .unwrap();

        assert_eq!(
            coverage.ranges,
            vec![range(date(2019, 12, 30), date(2020, 1, 10))]
        );
        // 2019-12-30, 2019-12-31, 2020-01-01 and 2020-01-07
        assert_eq!(coverage.rows_written, 4);
    }

    #[tokio::test]
    async fn test_incomplete_and_invalid_rows_are_rejected() {
        let f = fixture(false);
        let mut partial = bar(date(2024, 1, 2), dec!(10));
        partial.volume = None;
        let mut inverted = bar(date(2024, 1, 3), dec!(10));
        inverted.high = Some(dec!(5));
        f.source.set_history(
            "AAPL",
            vec![bar(date(2024, 1, 1), dec!(10)), partial, inverted],
        );

        let coverage = f
            .orchestrator
            .ensure_symbol("AAPL", range(date(2024, 1, 1), date(2024, 1, 3)), 7, false)
            .await
            .unwrap();
        assert_eq!(coverage.rows_written, 1);
        assert_eq!(coverage.rows_rejected, 2);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let f = fixture(false);
        f.source
            .set_weekday_history("AAPL", date(2024, 1, 1), date(2024, 1, 5), dec!(10));
        f.source
            .set_weekday_history("MSFT", date(2024, 1, 1), date(2024, 1, 5), dec!(20));
        f.source.fail_symbol("MSFT");

        let summary = f
            .orchestrator
            .ensure_coverage_parallel(
                &symbols(&["AAPL", "MSFT", "NOPE"]),
                range(date(2024, 1, 1), date(2024, 1, 5)),
                7,
            )
            .await;

        assert_eq!(summary.symbols.len(), 1);
        assert_eq!(summary.symbols[0].symbol, "AAPL");
        assert_eq!(summary.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_storage_error_aborts_symbol_and_releases_lock() {
        let f = fixture(false);
        f.source
            .set_weekday_history("AAPL", date(2024, 1, 1), date(2024, 1, 5), dec!(10));
        f.store.set_fail_on_upsert(true);
        let request = range(date(2024, 1, 1), date(2024, 1, 5));

        let err = f
            .orchestrator
            .ensure_symbol("AAPL", request, 7, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        f.store.set_fail_on_upsert(false);
        let coverage = f
            .orchestrator
            .ensure_symbol("AAPL", request, 7, false)
            .await
            .unwrap();
        assert_eq!(coverage.rows_written, 5);
    }

    #[tokio::test]
    async fn test_bootstrap_runs_once() {
        let f = fixture(true);
        f.source
            .set_weekday_history("AAPL", date(2020, 1, 1), date(2020, 3, 31), dec!(10));
        let request = range(date(2020, 3, 1), date(2020, 3, 31));

        let first = f
            .orchestrator
            .ensure_symbol("AAPL", request, 7, false)
            .await
            .unwrap();
        assert!(first.bootstrapped);
        assert!(first.ranges.is_empty());
        assert!(f.state.is_bootstrapped("AAPL").unwrap());

        let second = f
            .orchestrator
            .ensure_symbol("AAPL", request, 7, false)
            .await
            .unwrap();
        assert!(!second.bootstrapped);
        assert_eq!(second.rows_written, 0);
        assert_eq!(f.source.history_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_force_overwrite_refetches_whole_range() {
        let f = fixture(false);
        f.store
            .seed_weekdays("AAPL", date(2020, 1, 2), date(2020, 1, 10));
        f.source
            .set_weekday_history("AAPL", date(2020, 1, 1), date(2020, 1, 31), dec!(50));
        let request = range(date(2020, 1, 1), date(2020, 1, 10));

        let coverage = f
            .orchestrator
            .ensure_symbol("AAPL", request, 7, true)
            .await
            .unwrap();
        assert_eq!(coverage.ranges, vec![request]);
        // Seven stored closes change from 100 to 50, 2020-01-01 is new
        assert_eq!(coverage.rows_written, 8);
    }

    #[tokio::test]
    async fn test_register_symbol_outcomes() {
        let f = fixture(false);
        let today = Utc::now().date_naive();
        f.source.set_weekday_history(
            "AAPL",
            today - Duration::days(30),
            today,
            dec!(10),
        );
        f.source.set_history("BROKEN", vec![]);
        f.source.fail_symbol("BROKEN");

        assert!(matches!(
            f.orchestrator.register_symbol("aapl").await,
            Registration::Success { symbol, .. } if symbol == "AAPL"
        ));
        assert!(matches!(
            f.orchestrator.register_symbol("UNKNOWN").await,
            Registration::ValidationFailed { .. }
        ));
        assert!(matches!(
            f.orchestrator.register_symbol("bad symbol!").await,
            Registration::ValidationFailed { .. }
        ));
        assert!(matches!(
            f.orchestrator.register_symbol("BROKEN").await,
            Registration::RegistrationFailed { .. }
        ));
    }
}
