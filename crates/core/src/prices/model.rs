//! Price domain model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pricesync_market_data::PriceBar;

/// Source identifier stamped on rows fetched from Yahoo
pub const DATA_SOURCE_YAHOO: &str = "YAHOO";

/// One stored daily row. Unique by (symbol, date).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub source: String,
    pub last_updated: DateTime<Utc>,
}

impl PriceRecord {
    /// Build a record from a source bar.
    ///
    /// Returns None when the bar is missing any OHLCV field.
    pub fn from_bar(symbol: &str, bar: &PriceBar, source: &str, now: DateTime<Utc>) -> Option<Self> {
        Some(Self {
            symbol: symbol.to_string(),
            date: bar.date,
            open: bar.open?,
            high: bar.high?,
            low: bar.low?,
            close: bar.close?,
            volume: bar.volume?,
            source: source.to_string(),
            last_updated: now,
        })
    }

    /// Invariants this row violates. Empty when the row is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if value <= Decimal::ZERO {
                violations.push(format!("{} must be positive, got {}", name, value));
            }
        }
        if self.high < self.open.max(self.close) {
            violations.push(format!(
                "high {} below max(open, close) {}",
                self.high,
                self.open.max(self.close)
            ));
        }
        if self.low > self.open.min(self.close) {
            violations.push(format!(
                "low {} above min(open, close) {}",
                self.low,
                self.open.min(self.close)
            ));
        }
        if self.volume < 0 {
            violations.push(format!("volume must be >= 0, got {}", self.volume));
        }

        violations
    }

    /// True when OHLCV and source match, ignoring `last_updated`.
    pub fn same_values(&self, other: &PriceRecord) -> bool {
        self.open == other.open
            && self.high == other.high
            && self.low == other.low
            && self.close == other.close
            && self.volume == other.volume
            && self.source == other.source
    }
}
