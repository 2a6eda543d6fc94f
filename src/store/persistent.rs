//! Persistent Store Module
//!
//! Second cache tier over a [`StorageMedium`]: slower and larger than the
//! memory tier, same expiry contract, no tag index and no size bound.
//! Persistence is best-effort throughout; a full or missing medium costs
//! cache hits, never correctness.

use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::{CacheEntry, StorageMedium};

// == Write Outcome ==
/// Result of a persistent write, surfaced so the failure mode stays
/// inspectable even though upper tiers discard it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum WriteOutcome {
    /// The entry was serialized and stored.
    Written,
    /// No medium is attached; the tier is a no-op.
    Disabled,
    /// The medium refused the write; expired entries were reclaimed and
    /// the value was dropped.
    Failed,
}

/// Minimal view of a stored envelope, enough to judge expiry without
/// knowing the value type.
#[derive(Deserialize)]
struct ExpiryProbe {
    expires_at: u64,
}

// == Persistent Store ==
/// Namespaced key-value tier serializing entries as JSON text.
///
/// Constructed with `None` for the medium in non-interactive contexts, in
/// which case every operation is a no-op returning absent.
pub struct PersistentStore<V> {
    medium: Option<Box<dyn StorageMedium>>,
    namespace: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> std::fmt::Debug for PersistentStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("namespace", &self.namespace)
            .field("enabled", &self.medium.is_some())
            .finish()
    }
}

impl<V: Serialize + DeserializeOwned> PersistentStore<V> {
    /// Creates a persistent tier over `medium`, storing entries under
    /// `namespace`-prefixed names. `None` yields a disabled no-op tier.
    pub fn new(namespace: impl Into<String>, medium: Option<Box<dyn StorageMedium>>) -> Self {
        Self {
            medium,
            namespace: namespace.into(),
            _value: PhantomData,
        }
    }

    /// Whether a medium is attached.
    pub fn is_enabled(&self) -> bool {
        self.medium.is_some()
    }

    fn name_for(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    // == Get ==
    /// Retrieves and deserializes a value by key.
    ///
    /// Corrupt and expired entries are treated as absent and removed from
    /// the medium as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let medium = self.medium.as_ref()?;
        let name = self.name_for(key);
        let raw = medium.get_item(&name)?;

        match serde_json::from_str::<CacheEntry<V>>(&raw) {
            Ok(entry) if entry.is_expired() => {
                medium.remove_item(&name);
                None
            }
            Ok(entry) => Some(entry.value),
            Err(err) => {
                debug!(key, %err, "removing corrupt persistent entry");
                medium.remove_item(&name);
                None
            }
        }
    }

    // == Set ==
    /// Serializes and stores a value expiring `ttl` from now.
    ///
    /// On a refused write the store reclaims expired entries from the
    /// medium and gives up; the data loss is acceptable by contract.
    pub fn set(&self, key: &str, value: &V, ttl: Duration) -> WriteOutcome {
        let Some(medium) = self.medium.as_ref() else {
            return WriteOutcome::Disabled;
        };

        let entry = CacheEntry {
            value,
            expires_at: crate::store::now_ms() + ttl.as_millis() as u64,
            tags: None,
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, %err, "failed to serialize entry for persistent tier");
                return WriteOutcome::Failed;
            }
        };

        match medium.set_item(&self.name_for(key), &raw) {
            Ok(()) => WriteOutcome::Written,
            Err(err) => {
                warn!(key, %err, "persistent write refused, reclaiming expired entries");
                self.clear_expired();
                WriteOutcome::Failed
            }
        }
    }

    // == Delete ==
    /// Removes an entry by key. Removing an absent key is a no-op.
    pub fn delete(&self, key: &str) {
        if let Some(medium) = self.medium.as_ref() {
            medium.remove_item(&self.name_for(key));
        }
    }

    // == Clear ==
    /// Removes every entry under this store's namespace.
    pub fn clear(&self) {
        let Some(medium) = self.medium.as_ref() else {
            return;
        };
        for name in self.namespaced_items(medium.as_ref()) {
            medium.remove_item(&name);
        }
    }

    // == Clear Expired ==
    /// Removes expired entries under this store's namespace, plus any that
    /// no longer parse. Returns the removed count.
    pub fn clear_expired(&self) -> usize {
        let Some(medium) = self.medium.as_ref() else {
            return 0;
        };

        let mut removed = 0;
        for name in self.namespaced_items(medium.as_ref()) {
            let Some(raw) = medium.get_item(&name) else {
                continue;
            };
            let stale = match serde_json::from_str::<ExpiryProbe>(&raw) {
                Ok(probe) => crate::store::now_ms() > probe.expires_at,
                Err(_) => true,
            };
            if stale {
                medium.remove_item(&name);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(count = removed, "cleared expired persistent entries");
        }
        removed
    }

    fn namespaced_items(&self, medium: &dyn StorageMedium) -> Vec<String> {
        medium
            .item_names()
            .into_iter()
            .filter(|name| name.starts_with(&self.namespace))
            .collect()
    }
}
