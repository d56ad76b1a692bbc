use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::backend::CacheBackend;
use super::local::LocalCache;

/// Cache front end used by the engine.
///
/// Never surfaces backend errors: any failure of the selected backend is
/// retried against the bounded local cache with the same TTL.
pub struct Cache {
    primary: Arc<dyn CacheBackend>,
    fallback: Arc<LocalCache>,
    ttl: Duration,
}

impl Cache {
    /// Cache that only ever uses the local backend.
    pub fn local(capacity: u64, ttl: Duration) -> Self {
        let fallback = Arc::new(LocalCache::new(capacity));
        Self {
            primary: fallback.clone(),
            fallback,
            ttl,
        }
    }

    /// Select the shared backend if it answers a ping, otherwise local.
    pub async fn probe(
        shared: Option<Arc<dyn CacheBackend>>,
        capacity: u64,
        ttl: Duration,
    ) -> Self {
        let mut cache = Self::local(capacity, ttl);

        if let Some(shared) = shared {
            match shared.ping().await {
                Ok(()) => {
                    info!("Using '{}' cache backend", shared.name());
                    cache.primary = shared;
                }
                Err(e) => info!(
                    "Cache backend '{}' unavailable, using local cache: {}",
                    shared.name(),
                    e
                ),
            }
        }

        cache
    }

    pub fn backend_name(&self) -> &'static str {
        self.primary.name()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.primary.get(key).await {
            Ok(value) => value,
            Err(e) => {
                debug!("Cache get '{}' failed, using local: {}", key, e);
                self.fallback.get(key).await.ok().flatten()
            }
        }
    }

    pub async fn set(&self, key: &str, value: String) {
        if let Err(e) = self.primary.set(key, value.clone(), self.ttl).await {
            debug!("Cache set '{}' failed, using local: {}", key, e);
            let _ = self.fallback.set(key, value, self.ttl).await;
        }
    }

    pub async fn get_multi(&self, keys: &[String]) -> HashMap<String, String> {
        match self.primary.get_multi(keys).await {
            Ok(found) => found,
            Err(e) => {
                debug!("Cache get_multi failed, using local: {}", e);
                self.fallback.get_multi(keys).await.unwrap_or_default()
            }
        }
    }

    pub async fn set_multi(&self, entries: Vec<(String, String)>) {
        if let Err(e) = self.primary.set_multi(entries.clone(), self.ttl).await {
            debug!("Cache set_multi failed, using local: {}", e);
            let _ = self.fallback.set_multi(entries, self.ttl).await;
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.primary.delete(key).await {
            debug!("Cache delete '{}' failed: {}", key, e);
        }
        // Entries may have landed locally during an outage
        let _ = self.fallback.delete(key).await;
    }

    /// Read and decode a JSON value. Undecodable entries count as misses.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Discarding undecodable cache entry '{}': {}", key, e);
                self.delete(key).await;
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, raw).await,
            Err(e) => debug!("Skipping cache write for '{}': {}", key, e),
        }
    }
}
