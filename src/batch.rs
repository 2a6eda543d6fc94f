//! Batch Coalescing Module
//!
//! Accumulates single-key load requests over a short window — bounded by
//! a flush delay and a distinct-key threshold — then issues one multi-key
//! loader call and fans per-key results (or per-key failures) back out to
//! every waiter.
//!
//! Each `load` call gets its own result channel; several calls for the
//! same key within one window share one loader invocation but are each
//! resolved individually.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{CacheError, Result};

// == Batch Options ==
/// Flush triggers for a batch window.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Distinct-key count that forces an immediate flush
    pub max_batch_size: usize,
    /// How long a window stays open waiting for more keys
    pub delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            delay: Duration::from_millis(10),
        }
    }
}

type Waiter<V> = oneshot::Sender<Result<V>>;
type Loader<K, V> = dyn Fn(Vec<K>) -> BoxFuture<'static, anyhow::Result<HashMap<K, V>>>
    + Send
    + Sync;

/// One accumulation window: per-key waiter lists plus the armed flush
/// timer, if any.
struct Window<K, V> {
    waiters: HashMap<K, Vec<Waiter<V>>>,
    timer: Option<JoinHandle<()>>,
}

impl<K, V> Default for Window<K, V> {
    fn default() -> Self {
        Self {
            waiters: HashMap::new(),
            timer: None,
        }
    }
}

struct Inner<K, V> {
    loader: Box<Loader<K, V>>,
    window: Mutex<Window<K, V>>,
    options: BatchOptions,
}

// == Batch Loader ==
/// Coalesces individual key loads into windowed multi-key loader calls.
///
/// Cheap to clone; clones share the same window and loader.
pub struct BatchLoader<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for BatchLoader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> BatchLoader<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    /// Creates a loader around a multi-key fetch function.
    ///
    /// Keys absent from the returned map reject their waiters with
    /// [`CacheError::MissingBatchResult`]; they are not coerced to a
    /// silent miss.
    pub fn new<F, Fut>(loader: F, options: BatchOptions) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<HashMap<K, V>>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                loader: Box::new(move |keys| loader(keys).boxed()),
                window: Mutex::new(Window::default()),
                options,
            }),
        }
    }

    // == Load ==
    /// Requests the value for one key through the current batch window.
    ///
    /// Arms the window's flush timer if it has none; reaching
    /// `max_batch_size` distinct keys flushes immediately instead.
    /// Resolves once the window's loader call settles.
    pub async fn load(&self, key: K) -> Result<V> {
        let (tx, rx) = oneshot::channel();

        let flush_now = {
            let mut window = self.inner.window.lock().await;
            window.waiters.entry(key).or_default().push(tx);
            if window.timer.is_none() {
                window.timer = Some(Self::spawn_flush_timer(Arc::clone(&self.inner)));
            }
            window.waiters.len() >= self.inner.options.max_batch_size
        };

        if flush_now {
            Self::flush(&self.inner).await;
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Internal(
                "batch waiter dropped without resolution".to_string(),
            )),
        }
    }

    /// Arms a timer that flushes the window after the configured delay.
    fn spawn_flush_timer(inner: Arc<Inner<K, V>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(inner.options.delay).await;
            // Vacate the timer slot first: this task must not end up
            // aborting itself when the detached window is torn down.
            inner.window.lock().await.timer = None;
            Self::flush(&inner).await;
        })
    }

    // == Flush ==
    /// Detaches the current window and resolves every waiter in it.
    ///
    /// The swap-in of a fresh empty window happens before the loader call
    /// begins, so `load` calls arriving mid-flight accumulate into the
    /// next window instead of racing this one.
    async fn flush(inner: &Arc<Inner<K, V>>) {
        let window = {
            let mut guard = inner.window.lock().await;
            std::mem::take(&mut *guard)
        };

        if let Some(timer) = window.timer {
            timer.abort();
        }
        if window.waiters.is_empty() {
            return;
        }

        let keys: Vec<K> = window.waiters.keys().cloned().collect();
        debug!(distinct_keys = keys.len(), "flushing batch window");

        match (inner.loader)(keys).await {
            Ok(mut results) => {
                for (key, waiters) in window.waiters {
                    match results.remove(&key) {
                        Some(value) => {
                            for waiter in waiters {
                                let _ = waiter.send(Ok(value.clone()));
                            }
                        }
                        None => {
                            for waiter in waiters {
                                let _ = waiter
                                    .send(Err(CacheError::MissingBatchResult(key.to_string())));
                            }
                        }
                    }
                }
            }
            Err(err) => {
                let shared = Arc::new(err);
                for waiters in window.waiters.into_values() {
                    for waiter in waiters {
                        let _ = waiter.send(Err(CacheError::Fetch(Arc::clone(&shared))));
                    }
                }
            }
        }
    }
}
