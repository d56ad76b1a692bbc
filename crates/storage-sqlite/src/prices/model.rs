//! Database models for price rows and symbol state.

use diesel::prelude::*;

use crate::errors::StorageError;
use crate::utils::{
    format_date, format_decimal, format_timestamp, parse_date, parse_decimal, parse_timestamp,
};
use pricesync_core::prices::PriceRecord;

/// Database model for daily price rows
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::prices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceDB {
    pub symbol: String,
    pub date: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: i64,
    pub source: String,
    pub last_updated: String,
}

impl From<&PriceRecord> for PriceDB {
    fn from(row: &PriceRecord) -> Self {
        Self {
            symbol: row.symbol.clone(),
            date: format_date(row.date),
            open: format_decimal(row.open),
            high: format_decimal(row.high),
            low: format_decimal(row.low),
            close: format_decimal(row.close),
            volume: row.volume,
            source: row.source.clone(),
            last_updated: format_timestamp(row.last_updated),
        }
    }
}

impl TryFrom<PriceDB> for PriceRecord {
    type Error = StorageError;

    fn try_from(db: PriceDB) -> Result<Self, Self::Error> {
        Ok(PriceRecord {
            date: parse_date(&db.date)?,
            open: parse_decimal(&db.open)?,
            high: parse_decimal(&db.high)?,
            low: parse_decimal(&db.low)?,
            close: parse_decimal(&db.close)?,
            volume: db.volume,
            last_updated: parse_timestamp(&db.last_updated)?,
            symbol: db.symbol,
            source: db.source,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::symbol_state)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SymbolStateDB {
    pub symbol: String,
    pub bootstrapped: i32,
    pub bootstrapped_at: Option<String>,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_row_round_trips_through_db_model() {
        let row = PriceRecord {
            symbol: "AAPL".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: dec!(185.50),
            high: dec!(188.44),
            low: dec!(183.89),
            close: dec!(185.64),
            volume: 82_488_700,
            source: "YAHOO".to_string(),
            last_updated: Utc::now(),
        };
        let db = PriceDB::from(&row);
        assert_eq!(db.date, "2024-01-02");
        assert_eq!(db.open, "185.5");

        let back = PriceRecord::try_from(db).unwrap();
        assert!(back.same_values(&row));
        assert_eq!(back.date, row.date);
    }

    #[test]
    fn test_corrupt_decimal_is_rejected() {
        let db = PriceDB {
            symbol: "AAPL".to_string(),
            date: "2024-01-02".to_string(),
            open: "n/a".to_string(),
            high: "1".to_string(),
            low: "1".to_string(),
            close: "1".to_string(),
            volume: 0,
            source: "YAHOO".to_string(),
            last_updated: "2024-01-02T00:00:00.000000Z".to_string(),
        };
        assert!(matches!(
            PriceRecord::try_from(db),
            Err(StorageError::Corrupt(_))
        ));
    }
}
