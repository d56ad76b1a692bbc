use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single daily row as reported by a price source.
///
/// Every price field is optional because sources routinely return partial
/// rows (halted sessions, missing volume). Callers decide whether a partial
/// row is usable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading day of the row
    pub date: NaiveDate,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<Decimal>,

    /// Close adjusted for every corporate action known to the source today
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adj_close: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
}

impl PriceBar {
    /// Create a full OHLCV bar whose adjusted close equals its close.
    pub fn ohlcv(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
    ) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            adj_close: Some(close),
            volume: Some(volume),
        }
    }

    /// True when all of open, high, low, close and volume are present.
    pub fn is_complete(&self) -> bool {
        self.open.is_some()
            && self.high.is_some()
            && self.low.is_some()
            && self.close.is_some()
            && self.volume.is_some()
    }
}
