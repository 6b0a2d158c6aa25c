use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{KeySetError, KeySetSource};

#[derive(Clone)]
struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Per-URL slot. `fetch` serializes fetches so concurrent misses share one.
#[derive(Default)]
struct CacheEntry {
    fetch: Mutex<()>,
    current: RwLock<Option<CachedKeySet>>,
}

impl CacheEntry {
    async fn fresh(&self, ttl: Duration) -> Option<Arc<JwkSet>> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < ttl)
            .map(|cached| Arc::clone(&cached.keys))
    }
}

/// Caches platform key sets by URL.
///
/// A key set is served from memory while younger than the TTL. Concurrent
/// misses for one URL result in a single fetch. A failed fetch leaves any
/// previously cached set in place.
pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    ttl: Duration,
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
}

impl KeySetCache {
    pub fn new(source: Arc<dyn KeySetSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Key set for `url`, fetched on first use and after the TTL lapses.
    pub async fn get(&self, url: &str) -> Result<Arc<JwkSet>, KeySetError> {
        let entry = self.entry(url).await;
        if let Some(keys) = entry.fresh(self.ttl).await {
            return Ok(keys);
        }

        let _fetching = entry.fetch.lock().await;
        // Another caller may have filled the slot while we waited.
        if let Some(keys) = entry.fresh(self.ttl).await {
            return Ok(keys);
        }
        self.fetch_into(url, &entry).await
    }

    /// Fetch `url` now, regardless of the cached copy's age.
    pub async fn refresh(&self, url: &str) -> Result<Arc<JwkSet>, KeySetError> {
        let entry = self.entry(url).await;
        let _fetching = entry.fetch.lock().await;
        self.fetch_into(url, &entry).await
    }

    /// Refresh every URL seen so far. Returns how many refreshed successfully.
    pub async fn refresh_all(&self) -> usize {
        let urls: Vec<String> = self.entries.read().await.keys().cloned().collect();
        let mut refreshed = 0;
        for url in &urls {
            if self.refresh(url).await.is_ok() {
                refreshed += 1;
            }
        }
        debug!(total = urls.len(), refreshed, "Key set refresh pass finished");
        refreshed
    }

    pub async fn is_registered(&self, url: &str) -> bool {
        self.entries.read().await.contains_key(url)
    }

    async fn entry(&self, url: &str) -> Arc<CacheEntry> {
        if let Some(entry) = self.entries.read().await.get(url) {
            return Arc::clone(entry);
        }
        let mut entries = self.entries.write().await;
        Arc::clone(entries.entry(url.to_string()).or_default())
    }

    async fn fetch_into(&self, url: &str, entry: &CacheEntry) -> Result<Arc<JwkSet>, KeySetError> {
        match self.source.fetch(url).await {
            Ok(key_set) => {
                let keys = Arc::new(key_set);
                *entry.current.write().await = Some(CachedKeySet {
                    keys: Arc::clone(&keys),
                    fetched_at: Instant::now(),
                });
                info!(url, key_count = keys.keys.len(), "Platform key set cached");
                Ok(keys)
            }
            Err(e) => {
                warn!(url, error = %e, "Platform key set fetch failed");
                Err(e)
            }
        }
    }
}
