//! Token bucket rate limiter for the external price source.
//!
//! One bucket is shared by every caller in the process. Tokens refill
//! continuously at `requests_per_sec` up to `burst`.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Default sustained rate.
const DEFAULT_REQUESTS_PER_SEC: f64 = 2.0;

/// Default bucket capacity.
const DEFAULT_BURST: f64 = 5.0;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Tokens added per second
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn with_config(config: &RateLimitConfig) -> Self {
        Self {
            tokens: config.burst,
            last_update: Instant::now(),
            rate: config.requests_per_sec,
            capacity: config.burst,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Rate limiter configuration.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Sustained requests per second.
    pub requests_per_sec: f64,
    /// Maximum burst capacity.
    pub burst: f64,
}

impl RateLimitConfig {
    /// Builds a config, replacing non-positive values with the defaults.
    pub fn new(requests_per_sec: f64, burst: f64) -> Self {
        Self {
            requests_per_sec: if requests_per_sec > 0.0 {
                requests_per_sec
            } else {
                DEFAULT_REQUESTS_PER_SEC
            },
            burst: if burst >= 1.0 { burst } else { DEFAULT_BURST },
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_sec: DEFAULT_REQUESTS_PER_SEC,
            burst: DEFAULT_BURST,
        }
    }
}

/// Process-wide token bucket.
///
/// Construct once and share through an `Arc`. The internal lock is only
/// held long enough to refill and take a token; waiting happens outside it.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::with_config(&config)),
        }
    }

    /// Lock the bucket, recovering from poison.
    ///
    /// A poisoned bucket at worst misjudges a few tokens, which is preferable
    /// to panicking every caller.
    fn lock_bucket(&self) -> MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&self) {
        loop {
            let wait_time = {
                let mut bucket = self.lock_bucket();
                if bucket.try_acquire() {
                    return;
                }
                bucket.time_until_available()
            };

            if wait_time > Duration::ZERO {
                debug!("Rate limiter: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
    }

    /// Take a token without waiting. Returns false when throttled.
    pub fn try_acquire(&self) -> bool {
        self.lock_bucket().try_acquire()
    }

    pub fn remaining_tokens(&self) -> f64 {
        let mut bucket = self.lock_bucket();
        bucket.refill();
        bucket.tokens
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
