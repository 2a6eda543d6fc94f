//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.
//!
//! Store-level failures (a full or unavailable persistence medium) never
//! surface here; they are swallowed at the tier boundary and show up as
//! cache misses. `CacheError` only carries the failures that must reach a
//! waiting caller: fetcher/loader errors and batch-result gaps.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// A caller-supplied fetcher or batch loader failed.
    ///
    /// Wrapped in `Arc` because a single failure fans out to every waiter
    /// attached to the same in-flight fetch or batch window.
    #[error("fetch failed: {0}")]
    Fetch(Arc<anyhow::Error>),

    /// The batch loader ran but its result map had no entry for this key.
    #[error("no result for key: {0}")]
    MissingBatchResult(String),

    /// Internal invariant violation (e.g. a waiter channel closed without
    /// ever being resolved).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        CacheError::Fetch(Arc::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
