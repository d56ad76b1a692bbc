use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::db::WriteHandle;
use crate::errors::StorageError;
use crate::schema::symbol_locks::dsl as locks_dsl;
use crate::utils::format_timestamp;
use pricesync_core::constants::LOCK_LEASE_SECS;
use pricesync_core::lock::{LockBackend, LockError, LockHandle};
use pricesync_core::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Insertable)]
#[diesel(table_name = crate::schema::symbol_locks)]
struct NewLockDB {
    lock_key: String,
    token: String,
    expires_at: String,
}

/// Lock backend shared by every process that opens the same database.
///
/// A lock is a row keyed by name. Rows carry a lease so that a holder that
/// died without releasing is stolen from once the lease runs out. Live
/// holders renew the lease at a third of its length.
pub struct SqliteLockBackend {
    writer: WriteHandle,
    lease: chrono::Duration,
}

impl SqliteLockBackend {
    pub fn new(writer: WriteHandle) -> Self {
        Self::with_lease(writer, chrono::Duration::seconds(LOCK_LEASE_SECS))
    }

    pub fn with_lease(writer: WriteHandle, lease: chrono::Duration) -> Self {
        Self { writer, lease }
    }

    /// One attempt: clear an expired holder, then claim the row if free.
    async fn try_acquire(&self, key: &str, token: &str) -> Result<bool> {
        let now = Utc::now();
        let row = NewLockDB {
            lock_key: key.to_string(),
            token: token.to_string(),
            expires_at: format_timestamp(now + self.lease),
        };
        let now = format_timestamp(now);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let stolen = diesel::delete(
                    locks_dsl::symbol_locks
                        .filter(locks_dsl::lock_key.eq(&row.lock_key))
                        .filter(locks_dsl::expires_at.le(now)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                if stolen > 0 {
                    warn!("Lease on lock '{}' expired, taking it over", row.lock_key);
                }

                let inserted = diesel::insert_or_ignore_into(locks_dsl::symbol_locks)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(inserted == 1)
            })
            .await
    }
}

#[async_trait]
impl LockBackend for SqliteLockBackend {
    async fn acquire(&self, key: &str, timeout: Duration) -> std::result::Result<LockHandle, LockError> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + timeout;

        loop {
            let acquired = self
                .try_acquire(key, &token)
                .await
                .map_err(|e| LockError::Unavailable(e.to_string()))?;
            if acquired {
                debug!("Acquired lock '{}'", key);
                return Ok(LockHandle {
                    key: key.to_string(),
                    token,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Timeout(key.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, handle: &LockHandle) -> std::result::Result<(), LockError> {
        let key = handle.key.clone();
        let token = handle.token.clone();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::delete(
                    locks_dsl::symbol_locks
                        .filter(locks_dsl::lock_key.eq(key))
                        .filter(locks_dsl::token.eq(token)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(())
            })
            .await
            .map_err(|e| LockError::Unavailable(e.to_string()))
    }

    fn renew_interval(&self) -> Option<Duration> {
        (self.lease / 3).to_std().ok().filter(|every| !every.is_zero())
    }

    async fn renew(&self, handle: &LockHandle) -> std::result::Result<(), LockError> {
        let key = handle.key.clone();
        let token = handle.token.clone();
        let expires_at = format_timestamp(Utc::now() + self.lease);

        let renewed = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let renewed = diesel::update(
                    locks_dsl::symbol_locks
                        .filter(locks_dsl::lock_key.eq(key))
                        .filter(locks_dsl::token.eq(token)),
                )
                .set(locks_dsl::expires_at.eq(expires_at))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(renewed)
            })
            .await
            .map_err(|e| LockError::Unavailable(e.to_string()))?;

        if renewed == 0 {
            return Err(LockError::Lost(handle.key.clone()));
        }
        Ok(())
    }
}
