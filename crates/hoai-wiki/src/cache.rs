//! In-process query cache keyed by logical query identifiers.
//!
//! Backed by [`moka::future::Cache`]: concurrent reads of a missing or
//! expired key share a single load, and entries expire `stale_after` after
//! they were written. Entries are never edited directly: writers invalidate,
//! and the next read goes back to the loader.
//!
//! A small side table keeps the last loaded value and the load flags so
//! [`QueryCache::state`] can still show stale data after expiry,
//! invalidation or a failed reload.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};

use hoai_core::{Error, Result};

/// Upper bound on distinct query keys held at once.
const MAX_QUERIES: u64 = 64;

/// Snapshot of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_error: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_error: false,
        }
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

/// Shared query cache. Cloning yields another handle to the same entries.
#[derive(Clone)]
pub struct QueryCache<T> {
    inner: Arc<QueryCacheInner<T>>,
}

struct QueryCacheInner<T> {
    cache: Cache<String, T>,
    side: Mutex<HashMap<String, SideEntry<T>>>,
    stats: Mutex<CacheStats>,
}

struct SideEntry<T> {
    state: QueryState<T>,
    /// Bumped by every invalidation; a load that straddles one is dropped
    /// from the cache after it completes.
    generation: u64,
}

impl<T> Default for SideEntry<T> {
    fn default() -> Self {
        Self {
            state: QueryState::default(),
            generation: 0,
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Recover the loader's error; waiters that shared a failed load get a copy
/// of its message.
fn unshare(err: Arc<Error>) -> Error {
    Arc::try_unwrap(err).unwrap_or_else(|shared| Error::Internal(shared.to_string()))
}

impl<T: Clone + Send + Sync + 'static> QueryCache<T> {
    /// Create a cache whose entries expire `stale_after` after loading.
    pub fn new(stale_after: Duration) -> Self {
        Self {
            inner: Arc::new(QueryCacheInner {
                cache: Cache::builder()
                    .max_capacity(MAX_QUERIES)
                    .time_to_live(stale_after)
                    .build(),
                side: Mutex::new(HashMap::new()),
                stats: Mutex::new(CacheStats::default()),
            }),
        }
    }

    pub fn with_default_staleness() -> Self {
        Self::new(Duration::from_secs(hoai_core::defaults::CACHE_STALE_SECS))
    }

    fn update_side(&self, key: &str, f: impl FnOnce(&mut SideEntry<T>)) {
        let mut side = lock(&self.inner.side);
        f(side.entry(key.to_string()).or_default());
    }

    fn generation(&self, key: &str) -> u64 {
        lock(&self.inner.side)
            .get(key)
            .map(|e| e.generation)
            .unwrap_or(0)
    }

    /// Return cached data for `key`, or run `loader` and cache its result.
    ///
    /// Concurrent callers for the same key wait on one load. A failed load
    /// caches nothing and leaves the previous data visible in [`Self::state`].
    pub async fn fetch<F, Fut>(&self, key: &str, loader: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ran = AtomicBool::new(false);
        let started_generation = self.generation(key);
        let init = async {
            ran.store(true, Ordering::SeqCst);
            self.update_side(key, |e| e.state.is_loading = true);
            loader().await
        };

        let start = std::time::Instant::now();
        let result = self
            .inner
            .cache
            .try_get_with(key.to_string(), init)
            .await
            .map_err(unshare);

        if !ran.load(Ordering::SeqCst) {
            if result.is_ok() {
                lock(&self.inner.stats).hits += 1;
                debug!(subsystem = "cache", query_key = key, hit = true, "Cache hit");
            }
            return result;
        }

        lock(&self.inner.stats).misses += 1;
        match &result {
            Ok(data) => {
                let invalidated = {
                    let mut side = lock(&self.inner.side);
                    let entry = side.entry(key.to_string()).or_default();
                    entry.state = QueryState {
                        data: Some(data.clone()),
                        is_loading: false,
                        is_error: false,
                    };
                    entry.generation != started_generation
                };
                if invalidated {
                    self.inner.cache.invalidate(key).await;
                }
                debug!(
                    subsystem = "cache",
                    query_key = key,
                    duration_ms = start.elapsed().as_millis() as u64,
                    invalidated,
                    "Query loaded"
                );
            }
            Err(e) => {
                self.update_side(key, |entry| {
                    entry.state.is_loading = false;
                    entry.state.is_error = true;
                });
                lock(&self.inner.stats).errors += 1;
                warn!(subsystem = "cache", query_key = key, error = %e, "Query load failed");
            }
        }
        result
    }

    /// Mark `key` stale so the next [`Self::fetch`] reloads it.
    pub async fn invalidate(&self, key: &str) {
        if let Some(entry) = lock(&self.inner.side).get_mut(key) {
            entry.generation += 1;
        }
        self.inner.cache.invalidate(key).await;
        debug!(subsystem = "cache", query_key = key, "Query invalidated");
    }

    /// Last loaded data for `key` plus its load flags.
    pub fn state(&self, key: &str) -> QueryState<T> {
        lock(&self.inner.side)
            .get(key)
            .map(|e| e.state.clone())
            .unwrap_or_default()
    }

    /// Whether the next fetch of `key` is served without loading.
    pub fn is_fresh(&self, key: &str) -> bool {
        self.inner.cache.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        lock(&self.inner.stats).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hoai_core::Error;

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = Result<u32>> {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_fetch_caches_until_invalidated() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.fetch("wiki", || counting_loader(&calls, 1)).await.unwrap(), 1);
        assert_eq!(cache.fetch("wiki", || counting_loader(&calls, 2)).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate("wiki").await;
        assert!(!cache.is_fresh("wiki"));
        assert_eq!(cache.fetch("wiki", || counting_loader(&calls, 3)).await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 2, errors: 0 });
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_load() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            cache.fetch("wiki", || counting_loader(&calls, 7)),
            cache.fetch("wiki", || counting_loader(&calls, 8)),
            cache.fetch("wiki", || counting_loader(&calls, 9)),
        );
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (7, 7, 7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entries_go_stale_with_age() {
        let cache = QueryCache::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch("wiki", || counting_loader(&calls, 1)).await.unwrap();
        assert!(cache.is_fresh("wiki"));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!cache.is_fresh("wiki"));
        // Stale data stays visible until the reload.
        assert_eq!(cache.state("wiki").data, Some(1));

        assert_eq!(cache.fetch("wiki", || counting_loader(&calls, 2)).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_data() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.fetch("wiki", || async { Ok(1u32) }).await.unwrap();
        cache.invalidate("wiki").await;

        let err = cache
            .fetch("wiki", || async { Err::<u32, _>(Error::Internal("offline".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        let state = cache.state("wiki");
        assert_eq!(state.data, Some(1));
        assert!(state.is_error);
        assert!(!state.is_loading);
        assert_eq!(cache.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_invalidation_during_load_leaves_entry_stale() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let invalidator = cache.clone();

        let value = cache
            .fetch("wiki", || async move {
                invalidator.invalidate("wiki").await;
                Ok(5u32)
            })
            .await
            .unwrap();
        assert_eq!(value, 5);
        assert!(!cache.is_fresh("wiki"));
    }

    #[tokio::test]
    async fn test_state_of_unknown_key() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(1));
        assert_eq!(cache.state("missing"), QueryState::default());
        cache.invalidate("missing").await;
        assert!(!cache.is_fresh("missing"));
    }

    #[tokio::test]
    async fn test_waiters_share_a_failed_load() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err::<u32, _>(Error::Request("list unavailable".into()))
            }
        };

        let (a, b) = tokio::join!(cache.fetch("wiki", failing), cache.fetch("wiki", failing));
        assert!(a.unwrap_err().to_string().contains("list unavailable"));
        assert!(b.unwrap_err().to_string().contains("list unavailable"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.state("wiki").is_error);
        assert!(!cache.is_fresh("wiki"));
    }
}
