//! Tiered Lookup Module
//!
//! Read-through composition of the two tiers: memory first, persistent
//! second with promotion back into memory, and an injected fetch that
//! populates both on a full miss.
//!
//! Fetch failures are downgraded to absent at this layer; callers that
//! need failure visibility should wrap the fetcher themselves or use the
//! stale-while-revalidate or single-flight surfaces, which propagate.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::store::{CacheStats, MemoryStore, PersistentStore, StorageMedium};

// == Tiered Options ==
/// Per-call TTL and tagging knobs for tiered reads and writes.
#[derive(Debug, Clone)]
pub struct TieredOptions {
    /// TTL applied to memory-tier writes, including promotions
    pub memory_ttl: Duration,
    /// TTL applied to persistent-tier writes
    pub storage_ttl: Duration,
    /// Tags attached to the memory-tier entry
    pub tags: Option<HashSet<String>>,
}

impl Default for TieredOptions {
    fn default() -> Self {
        Self {
            memory_ttl: Duration::from_secs(60),
            storage_ttl: Duration::from_secs(300),
            tags: None,
        }
    }
}

impl TieredOptions {
    /// Options tagging the memory entry with the given labels.
    pub fn tagged<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: Some(tags.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}

// == Tiered Cache ==
/// Two-tier read-through cache.
///
/// The memory tier answers first; a persistent hit is promoted back into
/// memory with `memory_ttl`. Writes go through both tiers. Tag
/// invalidation only touches the memory tier; persistent staleness is
/// bounded by `storage_ttl` instead.
pub struct TieredCache<V> {
    memory: RwLock<MemoryStore<V>>,
    persistent: PersistentStore<V>,
}

impl<V> TieredCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Creates a tiered cache with a bounded memory tier and a persistent
    /// tier over `medium` (pass `None` for a memory-only cache).
    pub fn new(
        max_entries: usize,
        namespace: impl Into<String>,
        medium: Option<Box<dyn StorageMedium>>,
    ) -> Self {
        Self {
            memory: RwLock::new(MemoryStore::new(max_entries)),
            persistent: PersistentStore::new(namespace, medium),
        }
    }

    // == Get ==
    /// Looks `key` up through both tiers with default options.
    ///
    /// Returns None if neither tier holds a live entry.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.get_with(key, &TieredOptions::default()).await
    }

    /// Looks `key` up through both tiers, promoting a persistent hit into
    /// memory with `options.memory_ttl` and `options.tags`.
    pub async fn get_with(&self, key: &str, options: &TieredOptions) -> Option<V> {
        if let Some(value) = self.memory.write().await.get(key) {
            return Some(value);
        }

        if let Some(value) = self.persistent.get(key) {
            self.memory.write().await.set(
                key.to_string(),
                value.clone(),
                options.memory_ttl,
                options.tags.clone(),
            );
            return Some(value);
        }

        None
    }

    // == Get Or Fetch ==
    /// Looks `key` up through both tiers, invoking `fetcher` on a full
    /// miss and populating both tiers with the result.
    ///
    /// A fetcher failure is logged and downgraded to None.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        options: TieredOptions,
    ) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        if let Some(value) = self.get_with(key, &options).await {
            return Some(value);
        }

        match fetcher().await {
            Ok(value) => {
                self.set(key, value.clone(), options).await;
                Some(value)
            }
            Err(err) => {
                warn!(key, error = %err, "fetch failed, treating as cache miss");
                None
            }
        }
    }

    // == Set ==
    /// Writes `value` through both tiers unconditionally.
    pub async fn set(&self, key: &str, value: V, options: TieredOptions) {
        self.memory.write().await.set(
            key.to_string(),
            value.clone(),
            options.memory_ttl,
            options.tags,
        );
        let _ = self.persistent.set(key, &value, options.storage_ttl);
    }

    // == Delete ==
    /// Removes `key` from both tiers.
    pub async fn delete(&self, key: &str) {
        self.memory.write().await.delete(key);
        self.persistent.delete(key);
    }

    // == Invalidate By Tag ==
    /// Removes every memory-tier entry carrying `tag`; returns the count.
    ///
    /// The persistent tier has no tag index; its entries age out on their
    /// own TTL.
    pub async fn invalidate_by_tag(&self, tag: &str) -> usize {
        self.memory.write().await.invalidate_by_tag(tag)
    }

    // == Clear ==
    /// Drops every entry from both tiers.
    pub async fn clear(&self) {
        self.memory.write().await.clear();
        self.persistent.clear();
    }

    // == Sweep Expired ==
    /// Removes expired entries from both tiers; returns the total removed.
    pub async fn sweep_expired(&self) -> usize {
        let from_memory = self.memory.write().await.cleanup_expired();
        from_memory + self.persistent.clear_expired()
    }

    /// Memory-tier statistics snapshot.
    pub async fn stats(&self) -> CacheStats {
        self.memory.read().await.stats()
    }
}
