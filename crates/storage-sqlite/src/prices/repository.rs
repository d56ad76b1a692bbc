use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use super::model::PriceDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::prices::dsl as prices_dsl;
use crate::utils::{format_date, parse_date};
use pricesync_core::prices::{CoverageBounds, PriceRecord, PriceStore};
use pricesync_core::Result;
use pricesync_market_data::DateRange;

/// Rewrites a row only when one of its values differs, so the affected-row
/// count reports real changes and `last_updated` stays put otherwise.
const UPSERT_PRICE_SQL: &str = r#"
    INSERT INTO prices (symbol, date, open, high, low, close, volume, source, last_updated)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (symbol, date) DO UPDATE SET
        open = excluded.open,
        high = excluded.high,
        low = excluded.low,
        close = excluded.close,
        volume = excluded.volume,
        source = excluded.source,
        last_updated = excluded.last_updated
    WHERE prices.open IS NOT excluded.open
       OR prices.high IS NOT excluded.high
       OR prices.low IS NOT excluded.low
       OR prices.close IS NOT excluded.close
       OR prices.volume IS NOT excluded.volume
       OR prices.source IS NOT excluded.source
"#;

#[derive(QueryableByName)]
struct BoundsRow {
    #[diesel(sql_type = Nullable<Text>)]
    first_date: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    last_date: Option<String>,
    #[diesel(sql_type = BigInt)]
    row_count: i64,
}

pub struct PriceRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl PriceRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    fn bounds_query(
        &self,
        symbol: &str,
        range: Option<DateRange>,
    ) -> Result<Option<CoverageBounds>> {
        let mut conn = get_connection(&self.pool)?;
        let (start, end) = match range {
            Some(r) => (format_date(r.start), format_date(r.end)),
            None => ("0000-01-01".to_string(), "9999-12-31".to_string()),
        };

        let row: BoundsRow = diesel::sql_query(
            r#"
            SELECT
                MIN(date) AS first_date,
                MAX(date) AS last_date,
                COUNT(DISTINCT date) AS row_count
            FROM prices
            WHERE symbol = ? AND date >= ? AND date <= ?
            "#,
        )
        .bind::<Text, _>(symbol)
        .bind::<Text, _>(start)
        .bind::<Text, _>(end)
        .get_result(&mut conn)
        .into_core()?;

        match (row.first_date, row.last_date) {
            (Some(first), Some(last)) => Ok(Some(CoverageBounds {
                first_date: parse_date(&first)?,
                last_date: parse_date(&last)?,
                row_count: row.row_count,
            })),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl PriceStore for PriceRepository {
    // =========================================================================
    // Mutations
    // =========================================================================

    async fn upsert_prices(&self, rows: &[PriceRecord]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let db_rows: Vec<PriceDB> = rows.iter().map(PriceDB::from).collect();

        let changed = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut changed = 0;
                for row in db_rows {
                    changed += diesel::sql_query(UPSERT_PRICE_SQL)
                        .bind::<Text, _>(row.symbol)
                        .bind::<Text, _>(row.date)
                        .bind::<Text, _>(row.open)
                        .bind::<Text, _>(row.high)
                        .bind::<Text, _>(row.low)
                        .bind::<Text, _>(row.close)
                        .bind::<BigInt, _>(row.volume)
                        .bind::<Text, _>(row.source)
                        .bind::<Text, _>(row.last_updated)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(changed)
            })
            .await?;

        debug!("Upserted {} rows, {} changed", rows.len(), changed);
        Ok(changed)
    }

    async fn delete_prices(&self, symbol: &str, range: Option<DateRange>) -> Result<usize> {
        let symbol = symbol.to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let scope = prices_dsl::prices.filter(prices_dsl::symbol.eq(symbol));
                let deleted = match range {
                    Some(r) => diesel::delete(
                        scope
                            .filter(prices_dsl::date.ge(format_date(r.start)))
                            .filter(prices_dsl::date.le(format_date(r.end))),
                    )
                    .execute(conn),
                    None => diesel::delete(scope).execute(conn),
                }
                .map_err(StorageError::from)?;
                Ok(deleted)
            })
            .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn coverage_bounds(&self, symbol: &str, range: DateRange) -> Result<Option<CoverageBounds>> {
        self.bounds_query(symbol, Some(range))
    }

    fn stored_dates(&self, symbol: &str, range: DateRange) -> Result<Vec<NaiveDate>> {
        let mut conn = get_connection(&self.pool)?;

        let dates: Vec<String> = prices_dsl::prices
            .filter(prices_dsl::symbol.eq(symbol))
            .filter(prices_dsl::date.ge(format_date(range.start)))
            .filter(prices_dsl::date.le(format_date(range.end)))
            .select(prices_dsl::date)
            .order(prices_dsl::date.asc())
            .load(&mut conn)
            .into_core()?;

        dates
            .iter()
            .map(|d| parse_date(d).map_err(Into::into))
            .collect()
    }

    fn prices_in_range(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceRecord>> {
        let mut conn = get_connection(&self.pool)?;

        let mut query = prices_dsl::prices
            .filter(prices_dsl::symbol.eq(symbol))
            .into_boxed();
        if let Some(start) = start {
            query = query.filter(prices_dsl::date.ge(format_date(start)));
        }
        if let Some(end) = end {
            query = query.filter(prices_dsl::date.le(format_date(end)));
        }

        let rows: Vec<PriceDB> = query
            .select(PriceDB::as_select())
            .order(prices_dsl::date.asc())
            .load(&mut conn)
            .into_core()?;

        rows.into_iter()
            .map(|row| PriceRecord::try_from(row).map_err(Into::into))
            .collect()
    }

    fn date_bounds(&self, symbol: &str) -> Result<Option<DateRange>> {
        Ok(self
            .bounds_query(symbol, None)?
            .and_then(|b| DateRange::new(b.first_date, b.last_date)))
    }

    fn list_symbols(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;

        prices_dsl::prices
            .select(prices_dsl::symbol)
            .distinct()
            .order(prices_dsl::symbol.asc())
            .load(&mut conn)
            .into_core()
    }
}
