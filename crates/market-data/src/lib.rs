//! Pricesync Market Data Crate
//!
//! Access to an external source of daily prices and corporate actions.
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   FetchClient    |  (worker permits, timeout, retry with backoff)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |   RateLimiter    |  (one shared token bucket)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |   PriceSource    |  (Yahoo, test doubles)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`PriceBar`] - Raw daily row returned by a source
//! - [`CorporateActions`] - Splits, dividends and distributions for a symbol
//! - [`DateRange`] - Inclusive calendar date range
//! - [`MarketDataError`] - Fetch errors with a [`RetryClass`]

pub mod client;
pub mod errors;
pub mod limits;
pub mod models;
pub mod provider;

pub use client::{ClientConfig, FetchClient};
pub use errors::{MarketDataError, RetryClass};
pub use limits::{Backoff, RateLimitConfig, RateLimiter};
pub use models::{CorporateActions, DateRange, Distribution, Dividend, PriceBar, Split};
pub use provider::yahoo::YahooProvider;
pub use provider::PriceSource;
