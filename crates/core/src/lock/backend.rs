use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Proof of ownership returned by a successful acquire.
///
/// The token distinguishes this holder from later holders of the same key,
/// so a stale release cannot free someone else's lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockHandle {
    pub key: String,
    pub token: String,
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Timed out waiting for lock '{0}'")]
    Timeout(String),

    #[error("Lock backend unavailable: {0}")]
    Unavailable(String),

    #[error("Lock '{0}' is no longer held")]
    Lost(String),
}

/// A store of named locks shared by every process that touches the price store.
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Wait up to `timeout` for `key`.
    async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockHandle, LockError>;

    /// Release a held lock. Releasing an unknown or expired handle is a no-op.
    async fn release(&self, handle: &LockHandle) -> Result<(), LockError>;

    /// How often a holder must call [`renew`](Self::renew) to keep its lock.
    /// None for backends whose locks never expire.
    fn renew_interval(&self) -> Option<Duration> {
        None
    }

    /// Extend the lease of a held lock. Fails with [`LockError::Lost`] when the
    /// handle no longer owns the key.
    async fn renew(&self, _handle: &LockHandle) -> Result<(), LockError> {
        Ok(())
    }
}
