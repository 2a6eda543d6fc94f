//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired entries out of every
//! store owned by a cache service.
//!
//! Expired entries are already invisible to readers; the sweep exists to
//! reclaim their memory and medium space between reads.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::service::CacheService;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task loops forever, sleeping for the configured interval between
/// sweeps.
///
/// # Arguments
/// * `service` - Shared cache service whose stores are swept
/// * `cleanup_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the
/// task during graceful shutdown.
///
/// # Example
/// ```ignore
/// let service = Arc::new(CacheService::new(Config::from_env(), None));
/// let cleanup_handle = spawn_cleanup_task(service.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(
    service: Arc<CacheService<V>>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let interval = Duration::from_secs(cleanup_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = service.sweep_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tiered::TieredOptions;

    fn short_lived_options() -> TieredOptions {
        TieredOptions {
            memory_ttl: Duration::from_millis(100),
            storage_ttl: Duration::from_millis(100),
            tags: None,
        }
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let service: Arc<CacheService<String>> =
            Arc::new(CacheService::new(Config::default(), None));

        service
            .set_with("expire_soon", "value".to_string(), short_lived_options())
            .await;

        let handle = spawn_cleanup_task(service.clone(), 1);

        // Wait for the entry to expire and a sweep to run
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(service.stats().await.total_entries, 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let service: Arc<CacheService<String>> =
            Arc::new(CacheService::new(Config::default(), None));

        service.set("long_lived", "value".to_string()).await;

        let handle = spawn_cleanup_task(service.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(service.get("long_lived").await, Some("value".to_string()));
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let service: Arc<CacheService<String>> =
            Arc::new(CacheService::new(Config::default(), None));

        let handle = spawn_cleanup_task(service, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
