//! Purge and refetch of drifted symbols.

mod engine;

pub use engine::{AutoFixEngine, AutoFixOutcome};
