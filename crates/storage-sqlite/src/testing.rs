//! Temp-database fixture shared by the repository tests.

use std::sync::Arc;

use tempfile::{tempdir, TempDir};

use crate::db::{create_pool, run_migrations, spawn_writer, DbPool, WriteHandle};

/// A migrated database in a fresh temp directory.
///
/// The directory is returned so the caller keeps it alive. Must be called
/// from inside a tokio runtime.
pub fn setup() -> (Arc<DbPool>, WriteHandle, TempDir) {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = create_pool(&db_path.to_string_lossy()).expect("Failed to create pool");
    run_migrations(&pool).expect("Failed to run migrations");
    let writer = spawn_writer((*pool).clone());

    (pool, writer, temp_dir)
}
