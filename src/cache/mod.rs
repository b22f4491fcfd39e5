//! Cache Module
//!
//! Named response caches with strategy selection, size accounting and
//! byte-budgeted LRU eviction.

mod clock;
mod entry;
mod lru;
mod request;
mod size;
mod stats;
mod storage;
pub mod strategy;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, EntryIndex};
pub use lru::LruEvictor;
pub use request::{Request, Response, ResponseType};
pub use size::{compute_cache_size, estimate_response_size};
pub use stats::CacheStats;
pub use storage::{CacheStorage, MemoryCacheStorage};
pub use strategy::{AssetMatch, Strategy};

// == Public Constants ==
/// Default byte budget of the runtime cache (50 MiB)
pub const DEFAULT_MAX_BYTES: u64 = 50 * 1024 * 1024;
