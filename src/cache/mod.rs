//! Partitioned response cache for offline support.
//!
//! This module provides:
//! - Named, versioned partitions mapping request identity to a stored response
//! - Durable SQLite storage with per-key atomic writes
//! - The three caching strategies: cache-first, network-first and
//!   stale-while-revalidate

mod layer;
mod partition;
mod storage;
mod traits;

pub use layer::{CacheLayer, Strategy};
pub use partition::{Partition, PartitionNames};
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, CachedEntry, RequestKey};
