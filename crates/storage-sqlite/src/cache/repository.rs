use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::cache_entries::dsl as cache_dsl;
use crate::utils::{chunk_for_sqlite, format_timestamp, SQLITE_MAX_PARAMS_CHUNK};
use pricesync_core::cache::{CacheBackend, CacheEntry};
use pricesync_core::Result;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::cache_entries)]
struct CacheEntryDB {
    cache_key: String,
    value: String,
    expires_at: String,
}

impl From<CacheEntry> for CacheEntryDB {
    fn from(entry: CacheEntry) -> Self {
        Self {
            expires_at: format_timestamp(entry.expires_at()),
            cache_key: entry.key,
            value: entry.value,
        }
    }
}

/// Cache backend stored in the shared database, visible to every process
/// that opens it.
pub struct SqliteCacheBackend {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl SqliteCacheBackend {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Delete expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = format_timestamp(Utc::now());

        let purged = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let purged =
                    diesel::delete(cache_dsl::cache_entries.filter(cache_dsl::expires_at.le(now)))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                Ok(purged)
            })
            .await?;

        debug!("Purged {} expired cache entries", purged);
        Ok(purged)
    }

    async fn write_entries(&self, entries: Vec<CacheEntryDB>) -> Result<()> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                for chunk in entries.chunks(SQLITE_MAX_PARAMS_CHUNK / 3) {
                    diesel::replace_into(cache_dsl::cache_entries)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        diesel::sql_query("SELECT 1").execute(&mut conn).into_core()?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;

        cache_dsl::cache_entries
            .filter(cache_dsl::cache_key.eq(key))
            .filter(cache_dsl::expires_at.gt(format_timestamp(Utc::now())))
            .select(cache_dsl::value)
            .first(&mut conn)
            .optional()
            .into_core()
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.write_entries(vec![CacheEntry::new(key, value, ttl).into()])
            .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::delete(cache_dsl::cache_entries.filter(cache_dsl::cache_key.eq(key)))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, String>> {
        let mut conn = get_connection(&self.pool)?;
        let now = format_timestamp(Utc::now());

        let mut found = HashMap::with_capacity(keys.len());
        for chunk in chunk_for_sqlite(keys) {
            let rows: Vec<(String, String)> = cache_dsl::cache_entries
                .filter(cache_dsl::cache_key.eq_any(chunk))
                .filter(cache_dsl::expires_at.gt(&now))
                .select((cache_dsl::cache_key, cache_dsl::value))
                .load(&mut conn)
                .into_core()?;
            found.extend(rows);
        }
        Ok(found)
    }

    async fn set_multi(&self, entries: Vec<(String, String)>, ttl: Duration) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let rows: Vec<CacheEntryDB> = entries
            .into_iter()
            .map(|(key, value)| CacheEntry::new(key, value, ttl).into())
            .collect();
        self.write_entries(rows).await
    }
}
