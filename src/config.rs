//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the in-memory tier can hold
    pub max_entries: usize,
    /// TTL for entries written to the in-memory tier
    pub memory_ttl: Duration,
    /// TTL for entries written to the persistent tier
    pub storage_ttl: Duration,
    /// Age at which a stale-while-revalidate entry stops being fresh
    pub stale_ttl: Duration,
    /// Age at which a stale-while-revalidate entry must be refetched synchronously
    pub max_age: Duration,
    /// Maximum distinct keys in one batch window before an immediate flush
    pub max_batch_size: usize,
    /// How long a batch window stays open before flushing
    pub batch_delay: Duration,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Key prefix under which the persistent tier stores its entries
    pub namespace: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum in-memory entries (default: 1000)
    /// - `CACHE_MEMORY_TTL_MS` - Memory tier TTL in milliseconds (default: 60000)
    /// - `CACHE_STORAGE_TTL_MS` - Persistent tier TTL in milliseconds (default: 300000)
    /// - `CACHE_STALE_TTL_MS` - SWR freshness window in milliseconds (default: 60000)
    /// - `CACHE_MAX_AGE_MS` - SWR hard expiry in milliseconds (default: 300000)
    /// - `CACHE_MAX_BATCH_SIZE` - Batch flush size threshold (default: 100)
    /// - `CACHE_BATCH_DELAY_MS` - Batch flush delay in milliseconds (default: 10)
    /// - `CACHE_CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `CACHE_NAMESPACE` - Persistent tier key prefix (default: "tiercache:")
    pub fn from_env() -> Self {
        Self {
            max_entries: env_parse("CACHE_MAX_ENTRIES", 1000),
            memory_ttl: Duration::from_millis(env_parse("CACHE_MEMORY_TTL_MS", 60_000)),
            storage_ttl: Duration::from_millis(env_parse("CACHE_STORAGE_TTL_MS", 300_000)),
            stale_ttl: Duration::from_millis(env_parse("CACHE_STALE_TTL_MS", 60_000)),
            max_age: Duration::from_millis(env_parse("CACHE_MAX_AGE_MS", 300_000)),
            max_batch_size: env_parse("CACHE_MAX_BATCH_SIZE", 100),
            batch_delay: Duration::from_millis(env_parse("CACHE_BATCH_DELAY_MS", 10)),
            cleanup_interval: env_parse("CACHE_CLEANUP_INTERVAL", 60),
            namespace: env::var("CACHE_NAMESPACE").unwrap_or_else(|_| "tiercache:".to_string()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            memory_ttl: Duration::from_secs(60),
            storage_ttl: Duration::from_secs(300),
            stale_ttl: Duration::from_secs(60),
            max_age: Duration::from_secs(300),
            max_batch_size: 100,
            batch_delay: Duration::from_millis(10),
            cleanup_interval: 60,
            namespace: "tiercache:".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.memory_ttl, Duration::from_secs(60));
        assert_eq!(config.storage_ttl, Duration::from_secs(300));
        assert_eq!(config.stale_ttl, Duration::from_secs(60));
        assert_eq!(config.max_age, Duration::from_secs(300));
        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.batch_delay, Duration::from_millis(10));
        assert_eq!(config.cleanup_interval, 60);
        assert_eq!(config.namespace, "tiercache:");
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("CACHE_MAX_ENTRIES");
        env::remove_var("CACHE_MEMORY_TTL_MS");
        env::remove_var("CACHE_STORAGE_TTL_MS");
        env::remove_var("CACHE_STALE_TTL_MS");
        env::remove_var("CACHE_MAX_AGE_MS");
        env::remove_var("CACHE_MAX_BATCH_SIZE");
        env::remove_var("CACHE_BATCH_DELAY_MS");
        env::remove_var("CACHE_CLEANUP_INTERVAL");
        env::remove_var("CACHE_NAMESPACE");

        let config = Config::from_env();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.batch_delay, Duration::from_millis(10));
        assert_eq!(config.namespace, "tiercache:");
    }
}
