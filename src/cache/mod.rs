//! Generic two-level caching.
//!
//! This module is independent of what is being cached. It provides:
//! - A bounded in-process tier with insertion-order eviction
//! - A durable tier over any [`DurableStore`] (SQLite by default)
//! - Independent wall-clock TTLs per tier, with lazy expiry on read
//! - A background sweep that bounds memory growth between reads

mod layer;
mod memory;
mod storage;
mod traits;

pub use layer::{CacheSettings, TwoLevelCache};
pub use memory::MemoryTier;
pub use storage::{DurableStore, MemoryStore, SqliteStore};
pub use traits::{CacheEntry, CacheResult, CacheSource};
