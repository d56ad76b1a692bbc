//! Outbound call throttling.
//!
//! - `rate_limiter` - Shared token bucket (RateLimiter)
//! - `backoff` - Exponential delay schedule for transient failures (Backoff)

mod backoff;
mod rate_limiter;

pub use backoff::Backoff;
pub use rate_limiter::{RateLimitConfig, RateLimiter};
