//! Tiercache - a tiered caching and request-coordination layer
//!
//! Intermediates between application code and slow or expensive data
//! sources. Four cooperating mechanisms:
//!
//! - a bounded in-memory tier with TTL expiry, tag invalidation and FIFO
//!   eviction, backed by an optional persistent second tier
//!   ([`TieredCache`])
//! - a stale-while-revalidate read policy ([`SwrCache`])
//! - single-flight deduplication of concurrent fetches ([`SingleFlight`])
//! - timed batch coalescing of single-key loads ([`BatchLoader`])
//!
//! [`CacheService`] owns the shared state and is constructed once at
//! process start. The coordination primitives compose around any
//! caller-supplied async fetch function returning `anyhow::Result`.

pub mod batch;
pub mod config;
pub mod error;
pub mod service;
pub mod singleflight;
pub mod store;
pub mod swr;
pub mod tasks;
pub mod tiered;

pub use batch::{BatchLoader, BatchOptions};
pub use config::Config;
pub use error::{CacheError, Result};
pub use service::CacheService;
pub use singleflight::SingleFlight;
pub use store::{
    CacheStats, DirMedium, MemoryMedium, MemoryStore, PersistentStore, StorageMedium,
    WriteOutcome,
};
pub use swr::{SwrCache, SwrOptions};
pub use tasks::spawn_cleanup_task;
pub use tiered::{TieredCache, TieredOptions};
