//! Storage Module
//!
//! Durable key/value storage partitioned into named stores.
//!
//! A [`Database`] is opened once against a [`KvBackend`] with every store
//! declared up front. Records are JSON objects keyed by their string `id`
//! field.

mod backend;
mod database;
mod file;

pub use backend::{KvBackend, MemoryBackend};
pub use database::{Database, DatabaseSchema};
pub use file::FileBackend;

// == Public Constants ==
/// Name of the application's client-side database
pub const DB_NAME: &str = "app-offline";

/// Schema version of the application's database
pub const DB_VERSION: u32 = 1;

/// Store holding deferred mutating operations
pub const QUEUE_STORE: &str = "mutation-queue";

/// Store holding lifecycle and eviction events
pub const EVENT_LOG_STORE: &str = "event-log";

/// Store holding per-entry cache metadata (size, last access)
pub const CACHE_ENTRIES_STORE: &str = "cache-entries";

/// Field every record is keyed by
pub const ID_FIELD: &str = "id";
