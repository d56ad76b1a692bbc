//! Price source abstraction and implementations.
//!
//! Sources only translate between an upstream API and the crate's models.
//! Throttling, retrying and timeouts live in [`crate::client::FetchClient`].

mod traits;

pub mod yahoo;

pub use traits::PriceSource;
