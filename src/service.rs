//! Cache Service Module
//!
//! The long-lived object owning the caching layer's shared state: the
//! two-tier cache, the stale-while-revalidate store and the single-flight
//! table. Constructed once at process start and injected into call
//! sites; holds no external resources beyond the storage-medium handle,
//! so it needs no explicit teardown.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::batch::{BatchLoader, BatchOptions};
use crate::config::Config;
use crate::error::Result;
use crate::singleflight::SingleFlight;
use crate::store::{CacheStats, StorageMedium};
use crate::swr::{SwrCache, SwrOptions};
use crate::tiered::{TieredCache, TieredOptions};

// == Cache Service ==
/// Process-wide caching facade, generic over the cached value type.
///
/// Applications caching heterogeneous values instantiate with
/// `serde_json::Value`. Per-call options default to the service
/// [`Config`]; the `_with` variants override them.
pub struct CacheService<V> {
    config: Config,
    tiered: TieredCache<V>,
    swr: SwrCache<V>,
    flights: SingleFlight<V>,
}

impl<V> CacheService<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates the service from configuration and an optional persistence
    /// medium (pass `None` in contexts without one; the persistent tier
    /// then degrades to a no-op).
    pub fn new(config: Config, medium: Option<Box<dyn StorageMedium>>) -> Self {
        Self {
            tiered: TieredCache::new(config.max_entries, config.namespace.clone(), medium),
            swr: SwrCache::new(config.max_entries),
            flights: SingleFlight::new(),
            config,
        }
    }

    /// Tiered options derived from the service configuration.
    pub fn tiered_options(&self) -> TieredOptions {
        TieredOptions {
            memory_ttl: self.config.memory_ttl,
            storage_ttl: self.config.storage_ttl,
            tags: None,
        }
    }

    /// SWR options derived from the service configuration.
    pub fn swr_options(&self) -> SwrOptions {
        SwrOptions {
            stale_ttl: self.config.stale_ttl,
            max_age: self.config.max_age,
        }
    }

    // == Tiered Reads ==
    /// Looks `key` up through both tiers; None on a full miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.tiered.get_with(key, &self.tiered_options()).await
    }

    /// Read-through lookup with configured TTLs; fetch failures are
    /// downgraded to None.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetcher: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        self.tiered
            .get_or_fetch(key, fetcher, self.tiered_options())
            .await
    }

    /// Read-through lookup with explicit options.
    pub async fn get_or_fetch_with<F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        options: TieredOptions,
    ) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        self.tiered.get_or_fetch(key, fetcher, options).await
    }

    // == Tiered Writes ==
    /// Warms both tiers with a precomputed value.
    pub async fn set(&self, key: &str, value: V) {
        self.tiered.set(key, value, self.tiered_options()).await;
    }

    /// Warms both tiers with explicit options.
    pub async fn set_with(&self, key: &str, value: V, options: TieredOptions) {
        self.tiered.set(key, value, options).await;
    }

    /// Removes `key` from both tiers.
    pub async fn delete(&self, key: &str) {
        self.tiered.delete(key).await;
    }

    /// Removes every memory-tier entry carrying `tag`; returns the count.
    pub async fn invalidate_by_tag(&self, tag: &str) -> usize {
        self.tiered.invalidate_by_tag(tag).await
    }

    // == Stale-While-Revalidate ==
    /// Resolves `key` under the SWR policy with configured windows.
    pub async fn swr<F, Fut>(&self, key: &str, fetcher: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.swr.get(key, fetcher, self.swr_options()).await
    }

    /// Resolves `key` under the SWR policy with explicit windows.
    pub async fn swr_with<F, Fut>(&self, key: &str, fetcher: F, options: SwrOptions) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.swr.get(key, fetcher, options).await
    }

    // == Single-Flight ==
    /// Resolves `key` through at most one concurrent fetch.
    pub async fn dedupe<F, Fut>(&self, key: &str, fetcher: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.flights.dedupe(key, fetcher).await
    }

    // == Batch Coalescing ==
    /// Builds a batch loader around `loader` using the configured window
    /// size and delay. Batch loaders are per-origin; call sites keep the
    /// returned handle.
    pub fn batch_loader<K, U, F, Fut>(&self, loader: F) -> BatchLoader<K, U>
    where
        K: Eq + Hash + Clone + Display + Send + Sync + 'static,
        U: Clone + Send + 'static,
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<HashMap<K, U>>> + Send + 'static,
    {
        BatchLoader::new(
            loader,
            BatchOptions {
                max_batch_size: self.config.max_batch_size,
                delay: self.config.batch_delay,
            },
        )
    }

    // == Maintenance ==
    /// Removes expired entries from every store; returns the total
    /// removed.
    pub async fn sweep_expired(&self) -> usize {
        self.tiered.sweep_expired().await + self.swr.sweep_expired().await
    }

    /// Drops everything from every store.
    pub async fn clear(&self) {
        self.tiered.clear().await;
        self.swr.clear().await;
    }

    /// Memory-tier statistics snapshot.
    pub async fn stats(&self) -> CacheStats {
        self.tiered.stats().await
    }

    /// The service configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct access to the tiered cache for advanced composition.
    pub fn tiered(&self) -> &TieredCache<V> {
        &self.tiered
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryMedium;

    fn service() -> CacheService<String> {
        CacheService::new(Config::default(), Some(Box::new(MemoryMedium::new())))
    }

    #[tokio::test]
    async fn test_service_read_through() {
        let service = service();

        let value = service
            .get_or_fetch("key", || async { Ok("value".to_string()) })
            .await;

        assert_eq!(value, Some("value".to_string()));
        assert_eq!(service.get("key").await, Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_service_dedupe_and_swr_share_nothing() {
        let service = service();

        // The SWR store and the tiered store are independent keyspaces
        let swr_value = service
            .swr("key", || async { Ok("swr".to_string()) })
            .await
            .unwrap();
        assert_eq!(swr_value, "swr");
        assert_eq!(service.get("key").await, None);
    }

    #[tokio::test]
    async fn test_service_sweep_covers_all_stores() {
        let service = service();

        let options = TieredOptions {
            memory_ttl: std::time::Duration::from_millis(20),
            storage_ttl: std::time::Duration::from_millis(20),
            tags: None,
        };
        service.set_with("tiered", "v".to_string(), options).await;
        service
            .swr_with(
                "swr",
                || async { Ok("v".to_string()) },
                SwrOptions {
                    stale_ttl: std::time::Duration::from_millis(10),
                    max_age: std::time::Duration::from_millis(20),
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;

        assert_eq!(service.sweep_expired().await, 3);
    }

    #[tokio::test]
    async fn test_service_batch_loader_uses_config() {
        let service = service();

        let loader: BatchLoader<String, String> = service.batch_loader(|keys: Vec<String>| async move {
            Ok(keys
                .into_iter()
                .map(|k| (k.clone(), k.to_uppercase()))
                .collect::<HashMap<_, _>>())
        });

        let (a, b) = tokio::join!(loader.load("a".to_string()), loader.load("b".to_string()));
        assert_eq!(a.unwrap(), "A");
        assert_eq!(b.unwrap(), "B");
    }
}
