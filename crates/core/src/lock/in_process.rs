use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::backend::{LockBackend, LockError, LockHandle};

/// Lock backend for a single process.
///
/// Each key maps to its own async mutex. Held guards are parked by token
/// until `release` drops them.
#[derive(Default)]
pub struct InProcessLockBackend {
    locks: DashMap<String, Arc<Mutex<()>>>,
    held: DashMap<String, OwnedMutexGuard<()>>,
}

impl InProcessLockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of locks currently held.
    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Number of keys with a held lock or a waiter.
    pub fn key_count(&self) -> usize {
        self.locks.len()
    }

    /// Forget the mutex for `key` once nobody holds or waits on it.
    fn prune(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[async_trait]
impl LockBackend for InProcessLockBackend {
    async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockHandle, LockError> {
        let mutex = self.locks.entry(key.to_string()).or_default().clone();

        let guard = match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                self.prune(key);
                return Err(LockError::Timeout(key.to_string()));
            }
        };

        let token = Uuid::new_v4().to_string();
        self.held.insert(token.clone(), guard);

        Ok(LockHandle {
            key: key.to_string(),
            token,
        })
    }

    async fn release(&self, handle: &LockHandle) -> Result<(), LockError> {
        // The guard owns a reference to the mutex, so drop it before pruning
        if let Some((_, guard)) = self.held.remove(&handle.token) {
            drop(guard);
            self.prune(&handle.key);
        }
        Ok(())
    }
}
