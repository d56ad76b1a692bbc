mod repository;

pub use repository::SqliteLockBackend;
