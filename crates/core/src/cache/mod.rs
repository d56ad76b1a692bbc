//! TTL key/value cache with transparent degradation.
//!
//! - `backend` - Backend capability trait and entry type (CacheBackend, CacheEntry)
//! - `local` - Bounded in-process backend on moka (LocalCache)
//! - `service` - Front end that picks a backend at startup and falls back on errors (Cache)

mod backend;
mod local;
mod service;

pub use backend::{CacheBackend, CacheEntry};
pub use local::LocalCache;
pub use service::Cache;
