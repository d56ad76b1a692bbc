use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::task::JoinHandle;

use super::backend::{LockBackend, LockHandle};

/// Acquires per-symbol locks, degrading to unlocked operation on failure.
///
/// When the backend times out or is unreachable the caller proceeds without
/// the lock. Concurrent work on the same symbol may then duplicate fetches,
/// which the idempotent upsert absorbs. The first degradation is logged at
/// warn level, later ones at debug.
pub struct SymbolLocker {
    backend: Arc<dyn LockBackend>,
    timeout: Duration,
    degraded_warned: AtomicBool,
}

impl SymbolLocker {
    pub fn new(backend: Arc<dyn LockBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            degraded_warned: AtomicBool::new(false),
        }
    }

    pub async fn lock(&self, key: &str) -> SymbolGuard {
        match self.backend.acquire(key, self.timeout).await {
            Ok(handle) => SymbolGuard {
                heartbeat: self
                    .backend
                    .renew_interval()
                    .map(|every| spawn_heartbeat(self.backend.clone(), handle.clone(), every)),
                handle: Some(handle),
                backend: Some(self.backend.clone()),
            },
            Err(e) => {
                if !self.degraded_warned.swap(true, Ordering::SeqCst) {
                    warn!(
                        "Lock for '{}' unavailable ({}); continuing without symbol locking",
                        key, e
                    );
                } else {
                    debug!("Lock for '{}' unavailable ({}); continuing unlocked", key, e);
                }
                SymbolGuard::unlocked()
            }
        }
    }
}

/// Keep a leased lock alive until the guard stops the task.
fn spawn_heartbeat(
    backend: Arc<dyn LockBackend>,
    handle: LockHandle,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        // The first tick completes immediately
        ticks.tick().await;
        loop {
            ticks.tick().await;
            if let Err(e) = backend.renew(&handle).await {
                warn!("Stopped renewing lock '{}': {}", handle.key, e);
                break;
            }
        }
    })
}

/// A held (or degraded) symbol lock.
///
/// Prefer the explicit async [`release`](Self::release). Dropping a guard that
/// still holds a lock schedules the release on the current runtime. Leased
/// locks are renewed in the background for as long as the guard lives.
pub struct SymbolGuard {
    handle: Option<LockHandle>,
    backend: Option<Arc<dyn LockBackend>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl SymbolGuard {
    fn unlocked() -> Self {
        Self {
            handle: None,
            backend: None,
            heartbeat: None,
        }
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }

    /// False when the caller is running in degraded, unlocked mode.
    pub fn is_locked(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn release(mut self) {
        self.stop_heartbeat();
        if let (Some(handle), Some(backend)) = (self.handle.take(), self.backend.take()) {
            if let Err(e) = backend.release(&handle).await {
                warn!("Failed to release lock '{}': {}", handle.key, e);
            }
        }
    }
}

impl Drop for SymbolGuard {
    fn drop(&mut self) {
        self.stop_heartbeat();
        if let (Some(handle), Some(backend)) = (self.handle.take(), self.backend.take()) {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        if let Err(e) = backend.release(&handle).await {
                            warn!("Failed to release lock '{}': {}", handle.key, e);
                        }
                    });
                }
                Err(_) => warn!(
                    "Lock '{}' dropped outside a runtime; it will expire on its own",
                    handle.key
                ),
            }
        }
    }
}
