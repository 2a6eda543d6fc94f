//! Memory Store Module
//!
//! Bounded in-process tier combining HashMap storage with insertion-order
//! tracking, TTL expiration and tag-based group invalidation.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::debug;

use crate::store::{CacheEntry, CacheStats, FifoTracker};

// == Memory Store ==
/// Bounded key-value store with per-entry expiry and FIFO eviction.
///
/// Operations on this store never fail: a read of an absent or expired key
/// is a miss, and writes at capacity evict the oldest-inserted entry first.
/// All methods are synchronous; callers share the store behind a lock.
#[derive(Debug)]
pub struct MemoryStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Insertion-order tracker for eviction
    order: FifoTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl<V: Clone> MemoryStore<V> {
    /// Creates a new MemoryStore holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: FifoTracker::new(),
            stats: CacheStats::new(),
            max_entries,
        }
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns None if the key is absent or its TTL has passed; an expired
    /// entry is removed as a side effect. Reading a key does not protect it
    /// from eviction.
    pub fn get(&mut self, key: &str) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.record_hit();
                return Some(entry.value.clone());
            }
            Some(_) => {
                // Expired: treat as a miss and remove below
                self.entries.remove(key);
                self.order.remove(key);
                self.stats.record_expired(1);
                self.stats.set_total_entries(self.entries.len());
            }
            None => {}
        }
        self.stats.record_miss();
        None
    }

    // == Set ==
    /// Stores a key-value pair expiring `ttl` from now, optionally tagged.
    ///
    /// When the store is at capacity the oldest-inserted entry is evicted
    /// before inserting, even if `key` is already present. Overwriting a
    /// surviving key keeps its original insertion position.
    pub fn set(&mut self, key: String, value: V, ttl: Duration, tags: Option<HashSet<String>>) {
        if self.entries.len() >= self.max_entries {
            if let Some(evicted) = self.order.evict_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
                debug!(key = %evicted, "evicted oldest entry at capacity");
            }
        }

        let entry = CacheEntry::new(value, ttl, tags);
        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.record(&key);
        }
        self.stats.set_total_entries(self.entries.len());
    }

    // == Delete ==
    /// Removes an entry by key. Removing an absent key is a no-op.
    pub fn delete(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
    }

    // == Invalidate By Tag ==
    /// Removes every entry carrying `tag` and returns the removed count.
    ///
    /// Full scan; acceptable because the store is bounded.
    pub fn invalidate_by_tag(&mut self, tag: &str) -> usize {
        let tagged: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.has_tag(tag))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &tagged {
            self.entries.remove(key);
            self.order.remove(key);
        }
        self.stats.set_total_entries(self.entries.len());

        if !tagged.is_empty() {
            debug!(tag, count = tagged.len(), "invalidated entries by tag");
        }
        tagged.len()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries and returns the removed count.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
            self.order.remove(key);
        }

        self.stats.record_expired(expired.len() as u64);
        self.stats.set_total_entries(self.entries.len());
        expired.len()
    }

    // == Clear ==
    /// Drops every entry. Clearing an empty store is a no-op.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stats.set_total_entries(0);
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns current statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }
}
