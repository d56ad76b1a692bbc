use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use log::{debug, info, warn};

use super::classifier::classify;
use super::model::{AdjustmentEvent, ScanReport, ScanResult};
use super::sampling::sample_indices;
use super::scoring::{is_significant, pct_difference};
use crate::autofix::AutoFixEngine;
use crate::cache::Cache;
use crate::config::EngineConfig;
use crate::constants::{ACTIONS_CACHE_PREFIX, SCAN_CACHE_PREFIX};
use crate::errors::Result;
use crate::prices::{PriceRecord, PriceStore};
use pricesync_market_data::{CorporateActions, DateRange, FetchClient};

/// Compares sampled stored prices with the source's current history.
pub struct DriftDetector {
    store: Arc<dyn PriceStore>,
    client: Arc<FetchClient>,
    cache: Arc<Cache>,
    config: EngineConfig,
    auto_fix: Option<Arc<AutoFixEngine>>,
}

impl DriftDetector {
    pub fn new(
        store: Arc<dyn PriceStore>,
        client: Arc<FetchClient>,
        cache: Arc<Cache>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            client,
            cache,
            config,
            auto_fix: None,
        }
    }

    /// Enable `scan_all(.., true)` to purge and refetch flagged symbols.
    pub fn with_auto_fix(mut self, engine: Arc<AutoFixEngine>) -> Self {
        self.auto_fix = Some(engine);
        self
    }

    /// Scan one symbol, served from the cache when a fresh result exists.
    pub async fn detect(&self, symbol: &str) -> ScanResult {
        let key = format!("{}{}", SCAN_CACHE_PREFIX, symbol);
        if let Some(cached) = self.cache.get_json::<ScanResult>(&key).await {
            debug!("Drift scan cache hit for {}", symbol);
            return cached;
        }

        let result = self.scan(symbol, true).await;
        if result.error.is_none() {
            self.cache.set_json(&key, &result).await;
        }
        result
    }

    /// Scan `symbols`, or every stored symbol when None.
    ///
    /// With `auto_fix` the cache is bypassed and each symbol needing a
    /// refresh is handed to the auto-fix engine.
    pub async fn scan_all(&self, symbols: Option<Vec<String>>, auto_fix: bool) -> Result<ScanReport> {
        let symbols = match symbols {
            Some(symbols) => symbols,
            None => self.store.list_symbols()?,
        };
        if auto_fix && self.auto_fix.is_none() {
            warn!("Auto-fix requested but no auto-fix engine is configured");
        }

        let mut report = ScanReport::default();
        for symbol in &symbols {
            let result = if auto_fix {
                self.scan(symbol, false).await
            } else {
                self.detect(symbol).await
            };

            if auto_fix && result.needs_refresh {
                if let Some(engine) = &self.auto_fix {
                    let outcome = engine.auto_fix(symbol).await;
                    if outcome.job_created {
                        self.cache
                            .delete(&format!("{}{}", SCAN_CACHE_PREFIX, symbol))
                            .await;
                    }
                    report.auto_fixes.push(outcome);
                }
            }
            report.record(result);
        }

        info!(
            "Drift scan: {} scanned, {} need refresh, {} failed",
            report.symbols_scanned, report.symbols_needing_refresh, report.symbols_failed
        );
        Ok(report)
    }

    async fn scan(&self, symbol: &str, use_cache: bool) -> ScanResult {
        match self.compare(symbol, use_cache).await {
            Ok(result) => result,
            Err(e) => {
                debug!("Drift scan failed for {}: {}", symbol, e);
                ScanResult::failed(symbol, e.to_string())
            }
        }
    }

    async fn compare(&self, symbol: &str, use_cache: bool) -> Result<ScanResult> {
        let today = Utc::now().date_naive();
        let cutoff = today - Duration::days(self.config.minimum_data_age_days);
        let rows = self.store.prices_in_range(symbol, None, Some(cutoff))?;
        if rows.len() < 2 {
            return Ok(ScanResult::failed(
                symbol,
                format!("Insufficient data: {} row(s) older than {}", rows.len(), cutoff),
            ));
        }

        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        let samples: Vec<&PriceRecord> = sample_indices(&dates, self.config.sample_points)
            .into_iter()
            .map(|i| &rows[i])
            .collect();
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return Ok(ScanResult::failed(symbol, "No samples selected"));
        };
        let span = DateRange {
            start: first.date,
            end: last.date,
        };

        // Compare like with like: rows are stored from the source's close,
        // never its dividend-adjusted close.
        let reference: HashMap<NaiveDate, _> = self
            .client
            .fetch_history(symbol, span)
            .await?
            .into_iter()
            .filter_map(|bar| bar.close.map(|price| (bar.date, price)))
            .collect();

        // Actions up to today, since any of them may have rewritten a sample
        let actions_range = DateRange {
            start: span.start,
            end: today.max(span.end),
        };
        let actions = self
            .corporate_actions(symbol, actions_range, use_cache)
            .await?;

        let thresholds = &self.config.thresholds;
        let mut checked = 0;
        let mut events = Vec::new();

        for sample in samples {
            let Some(reference_price) = reference.get(&sample.date).copied() else {
                continue;
            };
            checked += 1;

            let pct = pct_difference(sample.close, reference_price);
            if !is_significant(pct, thresholds) {
                continue;
            }

            let classification = classify(pct, sample.date, &actions, thresholds);
            debug!(
                "{} drifted {}% on {} ({})",
                symbol, pct, sample.date, classification.event_type
            );
            events.push(AdjustmentEvent {
                symbol: symbol.to_string(),
                event_type: classification.event_type,
                severity: classification.severity,
                pct_difference: pct,
                check_date: sample.date,
                stored_price: sample.close,
                reference_price,
                details: classification.details,
                recommendation: classification.recommendation,
            });
        }

        Ok(ScanResult::from_events(symbol, events, checked))
    }

    async fn corporate_actions(
        &self,
        symbol: &str,
        range: DateRange,
        use_cache: bool,
    ) -> Result<CorporateActions> {
        let key = format!("{}{}:{}", ACTIONS_CACHE_PREFIX, symbol, range);
        if use_cache {
            if let Some(cached) = self.cache.get_json::<CorporateActions>(&key).await {
                return Ok(cached);
            }
        }
        let actions = self.client.fetch_corporate_actions(symbol, range).await?;
        self.cache.set_json(&key, &actions).await;
        Ok(actions)
    }
}
