//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the cache
//! service.
//!
//! # Tasks
//! - TTL Cleanup: Sweeps expired entries out of every store at a
//!   configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
