//! Fetch client wrapping a [`PriceSource`].
//!
//! Every call goes through the same pipeline:
//!
//! ```text
//! worker permit -> rate limiter token -> timeout(source call) -> retry on transient error
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, warn};
use tokio::sync::Semaphore;

use crate::errors::{MarketDataError, RetryClass};
use crate::limits::{Backoff, RateLimitConfig, RateLimiter};
use crate::models::{CorporateActions, DateRange, PriceBar};
use crate::provider::PriceSource;

/// Fetch client settings.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Upper bound on a single source call.
    pub timeout: Duration,
    /// Number of source calls allowed in flight at once.
    pub workers: usize,
    pub rate_limit: RateLimitConfig,
    pub backoff: Backoff,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            workers: 4,
            rate_limit: RateLimitConfig::default(),
            backoff: Backoff::default(),
        }
    }
}

/// Rate-limited, retrying access to a price source.
///
/// Cheap to share: construct once and hand out `Arc<FetchClient>`.
pub struct FetchClient {
    source: Arc<dyn PriceSource>,
    limiter: Arc<RateLimiter>,
    workers: Semaphore,
    backoff: Backoff,
    timeout: Duration,
}

impl FetchClient {
    pub fn new(source: Arc<dyn PriceSource>, config: ClientConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self::with_limiter(source, limiter, config)
    }

    /// Build a client that shares an existing rate limiter.
    pub fn with_limiter(
        source: Arc<dyn PriceSource>,
        limiter: Arc<RateLimiter>,
        config: ClientConfig,
    ) -> Self {
        Self {
            source,
            limiter,
            workers: Semaphore::new(config.workers.max(1)),
            backoff: config.backoff,
            timeout: config.timeout,
        }
    }

    pub fn source_id(&self) -> &'static str {
        self.source.id()
    }

    pub fn earliest_date(&self) -> NaiveDate {
        self.source.earliest_date()
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub async fn fetch_history(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        self.call("history", symbol, || {
            self.source.fetch_history(symbol, range.start, range.end)
        })
        .await
    }

    pub async fn fetch_corporate_actions(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<CorporateActions, MarketDataError> {
        self.call("corporate actions", symbol, || {
            self.source
                .fetch_corporate_actions(symbol, range.start, range.end)
        })
        .await
    }

    async fn call<T, F, Fut>(&self, operation: &str, symbol: &str, f: F) -> Result<T, MarketDataError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let mut retries = 0u32;

        loop {
            let error = match self.attempt(&f).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if error.retry_class() == RetryClass::Never {
                return Err(error);
            }

            if !self.backoff.should_retry(retries) {
                if retries == 0 {
                    return Err(error);
                }
                warn!(
                    "Giving up on {} for {} after {} attempts: {}",
                    operation,
                    symbol,
                    retries + 1,
                    error
                );
                return Err(MarketDataError::RetriesExhausted {
                    attempts: retries + 1,
                    last: Box::new(error),
                });
            }

            let delay = self.backoff.delay_for(retries);
            debug!(
                "Retrying {} for {} in {:?} after: {}",
                operation, symbol, delay, error
            );
            tokio::time::sleep(delay).await;
            retries += 1;
        }
    }

    async fn attempt<T, F, Fut>(&self, f: &F) -> Result<T, MarketDataError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|_| MarketDataError::WorkersClosed)?;

        self.limiter.acquire().await;

        match tokio::time::timeout(self.timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout {
                provider: self.source.id().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use rust_decimal_macros::dec;

    /// Source that replays scripted errors before succeeding.
    struct ScriptedSource {
        failures: Mutex<Vec<MarketDataError>>,
        calls: AtomicU32,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(failures: Vec<MarketDataError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        fn id(&self) -> &'static str {
            "SCRIPTED"
        }

        async fn fetch_history(
            &self,
            _symbol: &str,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<PriceBar>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let next = self.failures.lock().unwrap().pop();
            match next {
                Some(e) => Err(e),
                None => Ok(vec![PriceBar::ohlcv(
                    start,
                    dec!(10),
                    dec!(11),
                    dec!(9),
                    dec!(10),
                    100,
                )]),
            }
        }

        async fn fetch_corporate_actions(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<CorporateActions, MarketDataError> {
            Ok(CorporateActions::default())
        }
    }

    fn fast_config(max_retries: u32) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(5),
            workers: 2,
            rate_limit: RateLimitConfig::new(1000.0, 100.0),
            backoff: Backoff::new(
                Duration::from_millis(1),
                2.0,
                Duration::from_millis(5),
                max_retries,
            ),
        }
    }

    fn range() -> DateRange {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        DateRange::new(day, day).unwrap()
    }

    fn rate_limited() -> MarketDataError {
        MarketDataError::RateLimited {
            provider: "SCRIPTED".to_string(),
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let source = Arc::new(ScriptedSource::new(vec![rate_limited(), rate_limited()]));
        let client = FetchClient::new(source.clone(), fast_config(3));

        let bars = client.fetch_history("AAPL", range()).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let source = Arc::new(ScriptedSource::new(vec![MarketDataError::SymbolNotFound(
            "NOPE".to_string(),
        )]));
        let client = FetchClient::new(source.clone(), fast_config(3));

        let err = client.fetch_history("NOPE", range()).await.unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_cap_reports_exhaustion() {
        let source = Arc::new(ScriptedSource::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
        ]));
        let client = FetchClient::new(source.clone(), fast_config(2));

        let err = client.fetch_history("AAPL", range()).await.unwrap_err();
        match err {
            MarketDataError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, MarketDataError::RateLimited { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let source =
            Arc::new(ScriptedSource::new(vec![]).with_delay(Duration::from_millis(200)));
        let mut config = fast_config(0);
        config.timeout = Duration::from_millis(20);
        let client = FetchClient::new(source, config);

        let err = client.fetch_history("AAPL", range()).await.unwrap_err();
        assert!(matches!(err, MarketDataError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let source = Arc::new(ScriptedSource::new(vec![]).with_delay(Duration::from_millis(20)));
        let client = Arc::new(FetchClient::new(source.clone(), fast_config(0)));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.fetch_history("AAPL", range()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
    }
}
