use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use super::model::SymbolStateDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::symbol_state::dsl as state_dsl;
use crate::utils::format_timestamp;
use pricesync_core::prices::SymbolStateStore;
use pricesync_core::Result;

pub struct SymbolStateRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SymbolStateRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SymbolStateStore for SymbolStateRepository {
    fn is_bootstrapped(&self, symbol: &str) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;

        let flag: Option<i32> = state_dsl::symbol_state
            .filter(state_dsl::symbol.eq(symbol))
            .select(state_dsl::bootstrapped)
            .first(&mut conn)
            .optional()
            .into_core()?;

        Ok(flag.unwrap_or(0) != 0)
    }

    async fn mark_bootstrapped(&self, symbol: &str) -> Result<()> {
        let now = format_timestamp(Utc::now());
        let row = SymbolStateDB {
            symbol: symbol.to_string(),
            bootstrapped: 1,
            bootstrapped_at: Some(now.clone()),
            updated_at: now.clone(),
        };

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(state_dsl::symbol_state)
                    .values(&row)
                    .on_conflict(state_dsl::symbol)
                    .do_update()
                    .set((
                        state_dsl::bootstrapped.eq(1),
                        state_dsl::bootstrapped_at.eq(Some(now.clone())),
                        state_dsl::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await?;

        debug!("Marked {} as bootstrapped", symbol);
        Ok(())
    }
}
