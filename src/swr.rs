//! Stale-While-Revalidate Module
//!
//! Read policy over a bounded store of timestamped entries: fresh values
//! are served directly, stale-but-usable values are served immediately
//! while a detached background refresh runs, and dead values force a
//! synchronous refetch.
//!
//! Worst-case read latency after warmup is therefore one cache lookup;
//! staleness is bounded by `max_age`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::{MemoryStore, SwrEntry};

// == SWR Options ==
/// Freshness windows for a stale-while-revalidate read.
#[derive(Debug, Clone)]
pub struct SwrOptions {
    /// Age below which an entry is fresh and served without refetching
    pub stale_ttl: Duration,
    /// Age at which an entry is dead and must be refetched synchronously
    pub max_age: Duration,
}

impl Default for SwrOptions {
    fn default() -> Self {
        Self {
            stale_ttl: Duration::from_secs(60),
            max_age: Duration::from_secs(300),
        }
    }
}

// == SWR Cache ==
/// Bounded cache of timestamped entries applying the
/// fresh / stale-but-usable / dead read policy.
pub struct SwrCache<V> {
    entries: Arc<RwLock<MemoryStore<SwrEntry<V>>>>,
}

impl<V> SwrCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an SWR cache holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(MemoryStore::new(max_entries))),
        }
    }

    // == Get ==
    /// Resolves `key` under the SWR policy.
    ///
    /// - absent or dead (`age >= max_age`): awaits `fetcher`, stores and
    ///   returns its value; a fetch failure propagates to the caller.
    /// - fresh (`age < stale_ttl`): returns the cached value.
    /// - stale-but-usable: returns the cached value and spawns `fetcher`
    ///   as a detached refresh. A failed refresh is logged and leaves the
    ///   stale entry in place for the next call to retry.
    ///
    /// Every call in the stale window fires its own refresh; callers that
    /// need refresh dedup compose a single-flight around the fetcher.
    pub async fn get<F, Fut>(&self, key: &str, fetcher: F, options: SwrOptions) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let cached = self.entries.write().await.get(key);

        if let Some(entry) = cached {
            let age = Duration::from_millis(entry.age_ms());

            if age < options.stale_ttl {
                return Ok(entry.value);
            }

            if age < options.max_age {
                self.spawn_revalidation(key, fetcher(), options.max_age);
                return Ok(entry.value);
            }
            // Dead: fall through to the synchronous path
        }

        let value = fetcher().await?;
        self.entries.write().await.set(
            key.to_string(),
            SwrEntry::new(value.clone()),
            options.max_age,
            None,
        );
        Ok(value)
    }

    /// Spawns a detached refresh for `key`, replacing the entry on
    /// success.
    fn spawn_revalidation<Fut>(&self, key: &str, fetch: Fut, max_age: Duration)
    where
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let key = key.to_string();

        tokio::spawn(async move {
            match fetch.await {
                Ok(value) => {
                    debug!(key = %key, "background revalidation refreshed entry");
                    entries
                        .write()
                        .await
                        .set(key, SwrEntry::new(value), max_age, None);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "background revalidation failed, keeping stale entry");
                }
            }
        });
    }

    // == Sweep Expired ==
    /// Removes entries past their `max_age`; returns the removed count.
    pub async fn sweep_expired(&self) -> usize {
        self.entries.write().await.cleanup_expired()
    }

    // == Clear ==
    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Current number of tracked entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn windows(stale_ms: u64, max_ms: u64) -> SwrOptions {
        SwrOptions {
            stale_ttl: Duration::from_millis(stale_ms),
            max_age: Duration::from_millis(max_ms),
        }
    }

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
        value: &str,
    ) -> impl Future<Output = anyhow::Result<String>> + Send + 'static {
        let calls = Arc::clone(calls);
        let value = value.to_string();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_cold_start_fetches_synchronously() {
        let cache: SwrCache<String> = SwrCache::new(100);
        let calls = Arc::new(AtomicUsize::new(0));

        let value = cache
            .get("key", || counting_fetcher(&calls, "v1"), windows(50, 200))
            .await
            .unwrap();

        assert_eq!(value, "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_fetcher() {
        let cache: SwrCache<String> = SwrCache::new(100);
        let calls = Arc::new(AtomicUsize::new(0));
        let options = windows(100, 400);

        let first = cache
            .get("key", || counting_fetcher(&calls, "v1"), options.clone())
            .await
            .unwrap();
        let second = cache
            .get("key", || counting_fetcher(&calls, "v2"), options)
            .await
            .unwrap();

        assert_eq!(first, "v1");
        assert_eq!(second, "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "fresh read must not fetch");
    }

    #[tokio::test]
    async fn test_stale_entry_served_then_refreshed() {
        let cache: SwrCache<String> = SwrCache::new(100);
        let calls = Arc::new(AtomicUsize::new(0));
        let options = windows(100, 1000);

        cache
            .get("key", || counting_fetcher(&calls, "v1"), options.clone())
            .await
            .unwrap();

        // Enter the stale-but-usable window
        tokio::time::sleep(Duration::from_millis(150)).await;

        let stale = cache
            .get("key", || counting_fetcher(&calls, "v2"), options.clone())
            .await
            .unwrap();
        assert_eq!(stale, "v1", "stale value is served immediately");
        assert_eq!(calls.load(Ordering::SeqCst), 2, "one background refresh fired");

        // Let the background refresh land
        tokio::time::sleep(Duration::from_millis(50)).await;

        let refreshed = cache
            .get("key", || counting_fetcher(&calls, "v3"), options)
            .await
            .unwrap();
        assert_eq!(refreshed, "v2", "next read sees the refreshed value");
        assert_eq!(calls.load(Ordering::SeqCst), 2, "refreshed entry is fresh again");
    }

    #[tokio::test]
    async fn test_dead_entry_refetches_synchronously() {
        let cache: SwrCache<String> = SwrCache::new(100);
        let calls = Arc::new(AtomicUsize::new(0));
        let options = windows(20, 60);

        cache
            .get("key", || counting_fetcher(&calls, "v1"), options.clone())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        let value = cache
            .get("key", || counting_fetcher(&calls, "v2"), options)
            .await
            .unwrap();

        assert_eq!(value, "v2", "dead entry blocks on a fresh fetch");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entry() {
        let cache: SwrCache<String> = SwrCache::new(100);
        let calls = Arc::new(AtomicUsize::new(0));
        let options = windows(40, 10_000);

        cache
            .get("key", || counting_fetcher(&calls, "v1"), options.clone())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        let stale = cache
            .get(
                "key",
                || async { Err::<String, _>(anyhow::anyhow!("origin down")) },
                options.clone(),
            )
            .await
            .unwrap();
        assert_eq!(stale, "v1");

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Entry is still stale, so the next call retries the refresh
        let retried = cache
            .get("key", || counting_fetcher(&calls, "v2"), options)
            .await
            .unwrap();
        assert_eq!(retried, "v1", "stale value survives a failed refresh");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2, "retry fired a new refresh");
    }

    #[tokio::test]
    async fn test_cold_fetch_failure_propagates() {
        let cache: SwrCache<String> = SwrCache::new(100);

        let result = cache
            .get(
                "key",
                || async { Err::<String, _>(anyhow::anyhow!("origin down")) },
                SwrOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(CacheError::Fetch(_))));
        assert!(cache.is_empty().await, "nothing cached on the failure path");
    }
}
