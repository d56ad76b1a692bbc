mod repository;

pub use repository::SqliteCacheBackend;
