//! Price source trait definition.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::MarketDataError;
use crate::models::{CorporateActions, PriceBar};

/// An upstream source of daily prices and corporate actions.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use pricesync_market_data::provider::PriceSource;
///
/// struct CsvSource;
///
/// #[async_trait]
/// impl PriceSource for CsvSource {
///     fn id(&self) -> &'static str {
///         "CSV"
///     }
///
///     // ... implement fetch methods
/// }
/// ```
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Constant identifier like "YAHOO", used in logs, errors and stored rows.
    fn id(&self) -> &'static str;

    /// Oldest date the source can serve. Full-history loads start here.
    fn earliest_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Fetch daily rows for `[start, end]`, ordered by date ascending.
    ///
    /// Returns [`MarketDataError::NoDataForRange`] when the symbol exists but
    /// has no rows in the period.
    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, MarketDataError>;

    /// Fetch splits, dividends and distributions that took effect in `[start, end]`.
    async fn fetch_corporate_actions(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CorporateActions, MarketDataError>;
}
