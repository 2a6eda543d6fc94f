//! Store Module
//!
//! The two cache tiers and their supporting types: a bounded in-memory
//! store with TTL expiry, tag invalidation and FIFO eviction, and a
//! best-effort persistent store over a pluggable storage medium.

mod entry;
mod fifo;
mod medium;
mod memory;
mod persistent;
mod stats;


// Re-export public types
pub use entry::{now_ms, CacheEntry, SwrEntry};
pub use fifo::FifoTracker;
pub use medium::{DirMedium, MemoryMedium, StorageMedium};
pub use memory::MemoryStore;
pub use persistent::{PersistentStore, WriteOutcome};
pub use stats::CacheStats;
