//! Cache Entry Module
//!
//! Defines the structures for individual cache entries with TTL support.

use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A single cache entry: a value, its absolute expiry, and optional tags
/// for group invalidation.
///
/// The same struct doubles as the JSON envelope written to the persistent
/// tier, so field names are part of the persisted shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Tags this entry belongs to, for group invalidation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashSet<String>>,
}

impl<V> CacheEntry<V> {
    /// Creates a new cache entry expiring `ttl` from now.
    pub fn new(value: V, ttl: Duration, tags: Option<HashSet<String>>) -> Self {
        Self {
            value,
            expires_at: now_ms() + ttl.as_millis() as u64,
            tags,
        }
    }

    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is live up to and including its expiry
    /// instant and expired strictly after it. Readers must treat an expired
    /// entry as absent and remove it.
    pub fn is_expired(&self) -> bool {
        now_ms() > self.expires_at
    }

    /// Checks if the entry carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.as_ref().is_some_and(|tags| tags.contains(tag))
    }
}

// == SWR Entry ==
/// Payload tracked by the stale-while-revalidate policy: the value plus the
/// instant it was fetched, from which freshness is derived.
#[derive(Debug, Clone)]
pub struct SwrEntry<V> {
    /// The fetched value
    pub value: V,
    /// Fetch timestamp (Unix milliseconds)
    pub fetched_at: u64,
}

impl<V> SwrEntry<V> {
    /// Creates an entry stamped with the current time.
    pub fn new(value: V) -> Self {
        Self {
            value,
            fetched_at: now_ms(),
        }
    }

    /// Milliseconds elapsed since the value was fetched.
    pub fn age_ms(&self) -> u64 {
        now_ms().saturating_sub(self.fetched_at)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
