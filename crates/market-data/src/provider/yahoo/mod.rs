//! Yahoo Finance price source.
//!
//! Daily history and corporate action events both come from the chart
//! endpoint. Yahoo treats the end timestamp as exclusive, so every request
//! extends it by one day.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use log::{debug, warn};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{CorporateActions, Distribution, Dividend, PriceBar, Split};
use crate::provider::PriceSource;

const PROVIDER_ID: &str = "YAHOO";

pub struct YahooProvider {
    connector: yahoo::YahooConnector,
}

impl YahooProvider {
    pub fn new() -> Result<Self, MarketDataError> {
        let connector =
            yahoo::YahooConnector::new().map_err(|e| MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to initialize Yahoo connector: {}", e),
            })?;
        Ok(Self { connector })
    }

    fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, MarketDataError> {
        let timestamp = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| MarketDataError::ValidationFailed {
                message: format!("Invalid date: {}", date),
            })?;

        OffsetDateTime::from_unix_timestamp(timestamp).map_err(|e| {
            MarketDataError::ValidationFailed {
                message: format!("Date out of range {}: {}", date, e),
            }
        })
    }

    fn timestamp_to_date(timestamp: i64) -> Option<NaiveDate> {
        DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
    }

    fn to_decimal(value: f64) -> Option<Decimal> {
        if value.is_finite() {
            Decimal::from_f64(value)
        } else {
            None
        }
    }

    /// Map a connector error into the crate's error model.
    ///
    /// The connector only exposes HTTP failures as text, so transient
    /// statuses are recovered from the message.
    fn map_error(symbol: &str, error: yahoo::YahooError) -> MarketDataError {
        if matches!(error, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
            return MarketDataError::SymbolNotFound(symbol.to_string());
        }

        let message = error.to_string();
        let lowered = message.to_lowercase();

        for status in [429u16, 502, 503, 504, 408] {
            if message.contains(&status.to_string()) {
                if let Some(mapped) = MarketDataError::from_status(PROVIDER_ID, status) {
                    return mapped;
                }
            }
        }

        if lowered.contains("too many requests") {
            return MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            };
        }
        if lowered.contains("timed out") || lowered.contains("timeout") {
            return MarketDataError::Timeout {
                provider: PROVIDER_ID.to_string(),
            };
        }

        MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message,
        }
    }

    fn yahoo_quote_to_bar(quote: &yahoo::Quote) -> Option<PriceBar> {
        let date = Self::timestamp_to_date(quote.timestamp as i64)?;
        Some(PriceBar {
            date,
            open: Self::to_decimal(quote.open),
            high: Self::to_decimal(quote.high),
            low: Self::to_decimal(quote.low),
            close: Self::to_decimal(quote.close),
            adj_close: Self::to_decimal(quote.adjclose),
            volume: i64::try_from(quote.volume).ok(),
        })
    }

    async fn history_response(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<yahoo::YResponse, MarketDataError> {
        let start_time = Self::to_offset_datetime(start)?;
        let end_time = Self::to_offset_datetime(end + Duration::days(1))?;

        self.connector
            .get_quote_history(symbol, start_time, end_time)
            .await
            .map_err(|e| Self::map_error(symbol, e))
    }
}

#[async_trait]
impl PriceSource for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        debug!(
            "Fetching history for {} from {} to {} from Yahoo",
            symbol, start, end
        );

        let response = self.history_response(symbol, start, end).await?;

        match response.quotes() {
            Ok(quotes) => {
                let mut bars: Vec<PriceBar> = quotes
                    .iter()
                    .filter_map(Self::yahoo_quote_to_bar)
                    .filter(|bar| bar.date >= start && bar.date <= end)
                    .collect();
                bars.sort_by_key(|bar| bar.date);
                bars.dedup_by_key(|bar| bar.date);

                if bars.is_empty() {
                    return Err(MarketDataError::NoDataForRange);
                }
                Ok(bars)
            }
            Err(yahoo::YahooError::NoQuotes) => {
                warn!(
                    "No history returned for '{}' between {} and {}",
                    symbol, start, end
                );
                Err(MarketDataError::NoDataForRange)
            }
            Err(e) => Err(Self::map_error(symbol, e)),
        }
    }

    async fn fetch_corporate_actions(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CorporateActions, MarketDataError> {
        debug!(
            "Fetching corporate actions for {} from {} to {} from Yahoo",
            symbol, start, end
        );

        let response = self.history_response(symbol, start, end).await?;
        let in_range = |date: &NaiveDate| *date >= start && *date <= end;

        let splits = response
            .splits()
            .unwrap_or_default()
            .iter()
            .filter_map(|s| {
                Some(Split {
                    date: Self::timestamp_to_date(s.date as i64)?,
                    numerator: Self::to_decimal(s.numerator as f64)?,
                    denominator: Self::to_decimal(s.denominator as f64)?,
                })
            })
            .filter(|s| in_range(&s.date))
            .collect();

        let dividends = response
            .dividends()
            .unwrap_or_default()
            .iter()
            .filter_map(|d| {
                Some(Dividend {
                    date: Self::timestamp_to_date(d.date as i64)?,
                    amount: Self::to_decimal(d.amount)?,
                })
            })
            .filter(|d| in_range(&d.date))
            .collect();

        let distributions = response
            .capital_gains()
            .unwrap_or_default()
            .iter()
            .filter_map(|g| {
                Some(Distribution {
                    date: Self::timestamp_to_date(g.date as i64)?,
                    amount: Self::to_decimal(g.amount)?,
                })
            })
            .filter(|g| in_range(&g.date))
            .collect();

        Ok(CorporateActions {
            splits,
            dividends,
            distributions,
        }
        .sorted())
    }
}
