//! Cache Entry Module
//!
//! Per-entry metadata (size, last access) kept beside the response caches,
//! which have no access-time field of their own.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{estimate_response_size, Clock, Response};
use crate::error::Result;
use crate::storage::{Database, CACHE_ENTRIES_STORE};

// == Cache Entry ==
/// Metadata record of one cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// `<cache>|<key>`
    pub id: String,
    pub cache: String,
    /// Cache key (method and URL)
    pub key: String,
    /// Body size in bytes, computed when the entry was stored
    pub size: u64,
    /// Epoch milliseconds of the last hit or write
    pub last_accessed: i64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a metadata record for a response stored at `now`.
    pub fn new(cache: &str, key: &str, size: u64, now: i64) -> Self {
        Self {
            id: entry_id(cache, key),
            cache: cache.to_string(),
            key: key.to_string(),
            size,
            last_accessed: now,
        }
    }
}

fn entry_id(cache: &str, key: &str) -> String {
    format!("{}|{}", cache, key)
}

// == Entry Index ==
/// Metadata table over the `cache-entries` store.
#[derive(Debug, Clone)]
pub struct EntryIndex {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl EntryIndex {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    // == Record ==
    /// Records a freshly stored response, stamping it as just accessed.
    pub async fn record(&self, cache: &str, key: &str, response: &Response) -> Result<CacheEntry> {
        let entry = CacheEntry::new(cache, key, estimate_response_size(response), self.now_ms());
        self.db.put_as(CACHE_ENTRIES_STORE, &entry).await?;
        Ok(entry)
    }

    // == Touch ==
    /// Updates the last access time of an entry after a cache hit.
    ///
    /// Entries without metadata (stored before the index existed, or by
    /// another writer) get a record sized from `response`.
    pub async fn touch(&self, cache: &str, key: &str, response: &Response) -> Result<()> {
        let id = entry_id(cache, key);
        match self.db.get_as::<CacheEntry>(CACHE_ENTRIES_STORE, &id).await? {
            Some(mut entry) => {
                entry.last_accessed = self.now_ms();
                self.db.put_as(CACHE_ENTRIES_STORE, &entry).await
            }
            None => self.record(cache, key, response).await.map(|_| ()),
        }
    }

    pub async fn get(&self, cache: &str, key: &str) -> Result<Option<CacheEntry>> {
        self.db
            .get_as(CACHE_ENTRIES_STORE, &entry_id(cache, key))
            .await
    }

    /// Returns every metadata record, across all caches.
    pub async fn all(&self) -> Result<Vec<CacheEntry>> {
        self.db.get_all_as(CACHE_ENTRIES_STORE).await
    }

    /// Returns the metadata of every entry of a cache, by key.
    pub async fn entries_for(&self, cache: &str) -> Result<HashMap<String, CacheEntry>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|entry| entry.cache == cache)
            .map(|entry| (entry.key.clone(), entry))
            .collect())
    }

    pub async fn remove(&self, cache: &str, key: &str) -> Result<()> {
        self.db
            .remove(CACHE_ENTRIES_STORE, &entry_id(cache, key))
            .await
    }

    /// Drops the metadata of a whole cache. Returns the number of records
    /// removed.
    pub async fn remove_cache(&self, cache: &str) -> Result<usize> {
        let entries = self.entries_for(cache).await?;
        for entry in entries.values() {
            self.db.remove(CACHE_ENTRIES_STORE, &entry.id).await?;
        }
        Ok(entries.len())
    }
}
