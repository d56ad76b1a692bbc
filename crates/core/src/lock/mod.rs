//! Per-symbol mutual exclusion.
//!
//! - `backend` - Lock backend trait and handle types (LockBackend)
//! - `in_process` - Single-process backend built on tokio mutexes
//! - `locker` - Degrading front end used by the orchestrator (SymbolLocker)

mod backend;
mod in_process;
mod locker;

pub use backend::{LockBackend, LockError, LockHandle};
pub use in_process::InProcessLockBackend;
pub use locker::{SymbolGuard, SymbolLocker};
