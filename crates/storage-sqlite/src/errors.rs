//! Storage-specific error types for SQLite operations.
//!
//! Diesel, r2d2 and serde errors are wrapped here and converted to the
//! database-agnostic errors of `pricesync_core` at the crate boundary.

use diesel::result::Error as DieselError;
use thiserror::Error;
use pricesync_core::errors::{DatabaseError, Error};

/// Storage-specific errors that wrap Diesel and r2d2 types.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Stored value is malformed: {0}")]
    Corrupt(String),

    /// A core error raised inside a writer transaction, kept intact so it
    /// crosses the transaction boundary unchanged.
    #[error("{0}")]
    Core(Error),
}

impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::Core(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::PoolError(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::QueryFailed(DieselError::NotFound) => {
                Error::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            StorageError::QueryFailed(DieselError::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            )) => Error::Database(DatabaseError::UniqueViolation(info.message().to_string())),
            StorageError::QueryFailed(e) => {
                Error::Database(DatabaseError::QueryFailed(e.to_string()))
            }
            StorageError::SerializationError(e) | StorageError::Corrupt(e) => {
                Error::Database(DatabaseError::Internal(e))
            }
            StorageError::Core(e) => e,
        }
    }
}

/// Extension trait for converting Diesel and r2d2 results to core results.
///
/// Provides `.into_core()` on any `Result<T, E>` where `E` converts into
/// [`StorageError`].
pub trait IntoCore<T> {
    fn into_core(self) -> pricesync_core::Result<T>;
}

impl<T, E> IntoCore<T> for std::result::Result<T, E>
where
    E: Into<StorageError>,
{
    fn into_core(self) -> pricesync_core::Result<T> {
        self.map_err(|e| Error::from(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_database_not_found() {
        let err: Error = StorageError::QueryFailed(DieselError::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_core_error_survives_round_trip() {
        let original = Error::Cache("down".to_string());
        let err: Error = StorageError::from(original).into();
        assert!(matches!(err, Error::Cache(msg) if msg == "down"));
    }

    #[test]
    fn test_into_core_on_serde_error() {
        let parsed: std::result::Result<Vec<String>, _> = serde_json::from_str("{");
        let err = parsed.into_core().unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::Internal(_))));
    }
}
