//! Price storage traits.
//!
//! Reads are synchronous and writes are async, matching how the SQLite
//! implementation serializes writes through a single writer.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::PriceRecord;
use crate::errors::Result;
use pricesync_market_data::DateRange;

/// Aggregate of the rows stored for one symbol inside a date range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoverageBounds {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Distinct dates stored
    pub row_count: i64,
}

/// Storage interface for daily price rows.
#[async_trait]
pub trait PriceStore: Send + Sync {
    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert or update rows keyed by (symbol, date).
    ///
    /// Returns the number of rows that were inserted or whose values changed.
    /// Re-upserting identical rows returns zero and leaves `last_updated`
    /// untouched.
    async fn upsert_prices(&self, rows: &[PriceRecord]) -> Result<usize>;

    /// Delete a symbol's rows, optionally restricted to `range`.
    ///
    /// Returns the number of deleted rows.
    async fn delete_prices(&self, symbol: &str, range: Option<DateRange>) -> Result<usize>;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Min date, max date and distinct date count inside `range`.
    ///
    /// None when the symbol has no rows in the range.
    fn coverage_bounds(&self, symbol: &str, range: DateRange) -> Result<Option<CoverageBounds>>;

    /// All stored dates inside `range`, ascending.
    fn stored_dates(&self, symbol: &str, range: DateRange) -> Result<Vec<NaiveDate>>;

    /// Rows ordered by date ascending, with optional inclusive bounds.
    fn prices_in_range(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceRecord>>;

    /// Oldest and newest stored date across all of a symbol's rows.
    fn date_bounds(&self, symbol: &str) -> Result<Option<DateRange>>;

    /// Every symbol with at least one stored row, sorted.
    fn list_symbols(&self) -> Result<Vec<String>>;
}

/// Persisted per-symbol flags.
#[async_trait]
pub trait SymbolStateStore: Send + Sync {
    /// True once the symbol's full history has been loaded.
    fn is_bootstrapped(&self, symbol: &str) -> Result<bool>;

    async fn mark_bootstrapped(&self, symbol: &str) -> Result<()>;
}
