//! Single-Flight Module
//!
//! Collapses concurrent fetches for the same key into one underlying
//! call. Every caller that arrives while the fetch is in flight awaits a
//! shared handle to it and receives a clone of the same result, success
//! or failure.
//!
//! Only duplicate *initiation* is prevented: nothing is cached, and a
//! call arriving after the fetch settles starts a fresh one. Unrelated
//! keys never serialize behind each other.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{CacheError, Result};

type SharedFetch<V> = Shared<BoxFuture<'static, std::result::Result<V, Arc<anyhow::Error>>>>;

// == Single Flight ==
/// Per-key table of shared in-flight fetches.
pub struct SingleFlight<V> {
    pending: Arc<Mutex<HashMap<String, SharedFetch<V>>>>,
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    // == Dedupe ==
    /// Resolves `key` through at most one concurrent `fetcher` call.
    ///
    /// If a fetch for `key` is already in flight, awaits its shared
    /// result and `fetcher` is never invoked. Otherwise `fetcher` runs,
    /// and its pending entry is removed the moment it settles — before
    /// any waiter observes the result — so a caller arriving after
    /// settlement always starts a fresh fetch.
    ///
    /// A fetch failure fans out to every waiter as [`CacheError::Fetch`].
    pub async fn dedupe<F, Fut>(&self, key: &str, fetcher: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let shared = {
            let mut pending = self.pending.lock().await;
            if let Some(existing) = pending.get(key) {
                debug!(key, "joining in-flight fetch");
                existing.clone()
            } else {
                let table = Arc::clone(&self.pending);
                let owned_key = key.to_string();
                let fetch = fetcher();
                let shared: SharedFetch<V> = async move {
                    let result = fetch.await.map_err(Arc::new);
                    // The pending entry must be gone before any waiter can
                    // observe the result.
                    table.lock().await.remove(&owned_key);
                    result
                }
                .boxed()
                .shared();
                pending.insert(key.to_string(), shared.clone());
                shared
            }
        };

        shared.await.map_err(CacheError::Fetch)
    }

    /// Number of fetches currently in flight.
    pub async fn in_flight(&self) -> usize {
        self.pending.lock().await.len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn slow_fetcher(
        calls: &Arc<AtomicUsize>,
        value: &str,
    ) -> impl Future<Output = anyhow::Result<String>> + Send + 'static {
        let calls = Arc::clone(calls);
        let value = value.to_string();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_collapse_to_one_fetch() {
        let flight: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    flight.dedupe("key", || slow_fetcher(&calls, "result")).await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "result");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "fetcher ran exactly once");
    }

    #[tokio::test]
    async fn test_sequential_calls_fetch_twice() {
        let flight: SingleFlight<String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        flight.dedupe("key", || slow_fetcher(&calls, "a")).await.unwrap();
        flight.dedupe("key", || slow_fetcher(&calls, "b")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2, "settled fetches are never reused");
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_collapse() {
        let flight: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let a = {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { flight.dedupe("a", || slow_fetcher(&calls, "va")).await })
        };
        let b = {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move { flight.dedupe("b", || slow_fetcher(&calls, "vb")).await })
        };

        assert_eq!(a.await.unwrap().unwrap(), "va");
        assert_eq!(b.await.unwrap().unwrap(), "vb");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_fans_out_to_all_waiters() {
        let flight: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    flight
                        .dedupe("key", || {
                            let calls = Arc::clone(&calls);
                            async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(50)).await;
                                Err::<String, _>(anyhow::anyhow!("origin down"))
                            }
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(CacheError::Fetch(_))));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "one failure shared by all waiters");
    }

    #[tokio::test]
    async fn test_pending_entry_removed_after_settlement() {
        let flight: SingleFlight<String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        flight.dedupe("key", || slow_fetcher(&calls, "v")).await.unwrap();
        assert_eq!(flight.in_flight().await, 0);
    }
}
