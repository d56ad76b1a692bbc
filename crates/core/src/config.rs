//! Engine configuration.
//!
//! Every field has a default; `from_env` overrides individual fields from
//! `PRICESYNC_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use pricesync_market_data::{Backoff, ClientConfig, RateLimitConfig};

/// Drift detection thresholds, all in percent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftThresholds {
    /// Differences at or below this are treated as rounding noise
    pub noise_floor_pct: Decimal,
    pub min_detection_pct: Decimal,
    pub split_pct: Decimal,
    pub special_dividend_pct: Decimal,
    pub spinoff_pct: Decimal,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            noise_floor_pct: dec!(0.01),
            min_detection_pct: dec!(0.5),
            split_pct: dec!(25),
            special_dividend_pct: dec!(5),
            spinoff_pct: dec!(15),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub refetch_window_days: i64,
    pub sample_points: usize,
    pub thresholds: DriftThresholds,
    /// Rows younger than this are excluded from drift sampling
    pub minimum_data_age_days: i64,
    /// Load a symbol's full history the first time it is seen
    pub full_history_check: bool,
    pub rate_limit_per_sec: f64,
    pub rate_limit_burst: f64,
    pub backoff_base_ms: u64,
    pub backoff_multiplier: f64,
    pub backoff_max_ms: u64,
    pub max_retries: u32,
    pub fetch_timeout_secs: u64,
    /// In-flight source calls allowed across the process
    pub fetch_workers: usize,
    /// Symbols processed concurrently inside one job
    pub max_concurrent_fetches: usize,
    pub lock_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refetch_window_days: 7,
            sample_points: 10,
            thresholds: DriftThresholds::default(),
            minimum_data_age_days: 2,
            full_history_check: true,
            rate_limit_per_sec: 2.0,
            rate_limit_burst: 5.0,
            backoff_base_ms: 500,
            backoff_multiplier: 2.0,
            backoff_max_ms: 30_000,
            max_retries: 3,
            fetch_timeout_secs: 30,
            fetch_workers: 4,
            max_concurrent_fetches: 3,
            lock_timeout_ms: 10_000,
            cache_ttl_secs: 3_600,
            cache_capacity: 10_000,
        }
    }
}

fn env_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{}={}", name, raw))),
        Err(_) => Ok(None),
    }
}

macro_rules! override_from_env {
    ($target:expr, $name:literal) => {
        if let Some(value) = env_var($name)? {
            $target = value;
        }
    };
}

impl EngineConfig {
    /// Defaults overridden by any `PRICESYNC_*` variables that are set.
    ///
    /// A set but unparsable variable is an error rather than silently ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        let t = &mut config.thresholds;
        override_from_env!(t.noise_floor_pct, "PRICESYNC_NOISE_FLOOR_PCT");
        override_from_env!(t.min_detection_pct, "PRICESYNC_MIN_DETECTION_PCT");
        override_from_env!(t.split_pct, "PRICESYNC_SPLIT_THRESHOLD_PCT");
        override_from_env!(t.special_dividend_pct, "PRICESYNC_SPECIAL_DIVIDEND_PCT");
        override_from_env!(t.spinoff_pct, "PRICESYNC_SPINOFF_THRESHOLD_PCT");

        override_from_env!(config.refetch_window_days, "PRICESYNC_REFETCH_WINDOW_DAYS");
        override_from_env!(config.sample_points, "PRICESYNC_SAMPLE_POINTS");
        override_from_env!(config.minimum_data_age_days, "PRICESYNC_MINIMUM_DATA_AGE_DAYS");
        override_from_env!(config.full_history_check, "PRICESYNC_FULL_HISTORY_CHECK");
        override_from_env!(config.rate_limit_per_sec, "PRICESYNC_RATE_LIMIT_PER_SEC");
        override_from_env!(config.rate_limit_burst, "PRICESYNC_RATE_LIMIT_BURST");
        override_from_env!(config.backoff_base_ms, "PRICESYNC_BACKOFF_BASE_MS");
        override_from_env!(config.backoff_multiplier, "PRICESYNC_BACKOFF_MULTIPLIER");
        override_from_env!(config.backoff_max_ms, "PRICESYNC_BACKOFF_MAX_MS");
        override_from_env!(config.max_retries, "PRICESYNC_MAX_RETRIES");
        override_from_env!(config.fetch_timeout_secs, "PRICESYNC_FETCH_TIMEOUT_SECS");
        override_from_env!(config.fetch_workers, "PRICESYNC_FETCH_WORKERS");
        override_from_env!(config.max_concurrent_fetches, "PRICESYNC_MAX_CONCURRENT_FETCHES");
        override_from_env!(config.lock_timeout_ms, "PRICESYNC_LOCK_TIMEOUT_MS");
        override_from_env!(config.cache_ttl_secs, "PRICESYNC_CACHE_TTL_SECS");
        override_from_env!(config.cache_capacity, "PRICESYNC_CACHE_CAPACITY");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refetch_window_days < 0 {
            return Err(Error::Config("refetch_window_days must be >= 0".into()));
        }
        if self.sample_points < 2 {
            return Err(Error::Config("sample_points must be >= 2".into()));
        }
        if self.minimum_data_age_days < 0 {
            return Err(Error::Config("minimum_data_age_days must be >= 0".into()));
        }
        if self.fetch_workers == 0 || self.max_concurrent_fetches == 0 {
            return Err(Error::Config(
                "fetch_workers and max_concurrent_fetches must be > 0".into(),
            ));
        }
        if self.thresholds.noise_floor_pct.is_sign_negative()
            || self.thresholds.min_detection_pct.is_sign_negative()
        {
            return Err(Error::Config("detection thresholds must be >= 0".into()));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            workers: self.fetch_workers,
            rate_limit: RateLimitConfig::new(self.rate_limit_per_sec, self.rate_limit_burst),
            backoff: Backoff::new(
                Duration::from_millis(self.backoff_base_ms),
                self.backoff_multiplier,
                Duration::from_millis(self.backoff_max_ms),
                self.max_retries,
            ),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
