//! Column encoding helpers and SQLite batching.
//!
//! Dates, timestamps and decimals are stored as TEXT. Timestamps use a fixed
//! width UTC form so that text comparison in SQL orders them correctly.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::StorageError;

/// Maximum number of parameters bound in one `IN (...)` query.
///
/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` is 999; 500 leaves room for
/// the query's other parameters.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Split a slice into chunks small enough for one `IN (...)` query.
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| StorageError::Corrupt(format!("date '{}': {}", value, e)))
}

/// `2024-01-02T03:04:05.000006Z`
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("timestamp '{}': {}", value, e)))
}

/// Canonical text for a decimal: equal values always produce equal text.
pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

pub fn parse_decimal(value: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(value)
        .map_err(|e| StorageError::Corrupt(format!("decimal '{}': {}", value, e)))
}
