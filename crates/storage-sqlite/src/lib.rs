//! SQLite storage for the pricesync engine.
//!
//! Implements the store traits defined in `pricesync-core` with Diesel on
//! SQLite:
//! - Connection pooling and embedded migrations
//! - A single writer actor that serializes every write in an immediate transaction
//! - Price rows and per-symbol bootstrap state
//! - Fetch job persistence
//! - A table-backed lock backend and cache backend shared across processes
//!
//! ```text
//!   pricesync-core (traits)
//!            │
//!            ▼
//!   storage-sqlite (this crate)
//!            │
//!            ▼
//!        SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod utils;

pub mod cache;
pub mod jobs;
pub mod locks;
pub mod prices;

#[cfg(test)]
mod testing;

pub use db::{
    create_pool, get_connection, get_db_path, init, run_migrations, spawn_writer, Database,
    DbConnection, DbPool, WriteHandle,
};

pub use errors::{IntoCore, StorageError};

pub use cache::SqliteCacheBackend;
pub use jobs::FetchJobRepository;
pub use locks::SqliteLockBackend;
pub use prices::{PriceRepository, SymbolStateRepository};

pub use pricesync_core::errors::{DatabaseError, Error, Result};
