//! LRU Evictor Module
//!
//! Keeps a named cache under a byte budget by removing least recently
//! accessed entries first.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{
    compute_cache_size, estimate_response_size, CacheEntry, CacheStorage, EntryIndex,
};
use crate::error::Result;

// == LRU Evictor ==
/// Byte-budget enforcement over one [`CacheStorage`].
///
/// Eviction order:
/// - oldest `last_accessed` first
/// - equal timestamps keep the cache's insertion order
/// - entries with no metadata count as never accessed (timestamp 0)
#[derive(Clone)]
pub struct LruEvictor {
    storage: Arc<dyn CacheStorage>,
    index: EntryIndex,
}

impl LruEvictor {
    // == Constructor ==
    pub fn new(storage: Arc<dyn CacheStorage>, index: EntryIndex) -> Self {
        Self { storage, index }
    }

    // == Candidates ==
    /// Returns the entries of a cache in eviction order.
    pub async fn candidates(&self, cache_name: &str) -> Result<Vec<CacheEntry>> {
        let mut metadata = self.index.entries_for(cache_name).await?;
        let mut entries = Vec::new();

        for key in self.storage.keys(cache_name).await? {
            match metadata.remove(&key) {
                Some(entry) => entries.push(entry),
                None => {
                    // No metadata; size it from the body
                    if let Some(response) = self.storage.match_key(cache_name, &key).await? {
                        let size = estimate_response_size(&response);
                        entries.push(CacheEntry::new(cache_name, &key, size, 0));
                    }
                }
            }
        }

        // Stable sort keeps insertion order among equal timestamps
        entries.sort_by_key(|entry| entry.last_accessed);
        Ok(entries)
    }

    // == Evict To Fit ==
    /// Removes oldest entries until the cache holds at most `max_bytes`.
    ///
    /// Returns the number of entries removed. Never over-evicts: it stops as
    /// soon as the running total fits. A budget smaller than every entry
    /// empties the cache.
    pub async fn evict_to_fit(&self, cache_name: &str, max_bytes: u64) -> Result<usize> {
        let candidates = self.candidates(cache_name).await?;
        let mut total: u64 = candidates.iter().map(|entry| entry.size).sum();

        if total <= max_bytes {
            debug!(
                "Cache '{}' within budget ({} <= {} bytes)",
                cache_name, total, max_bytes
            );
            return Ok(0);
        }

        let mut evicted = 0;
        for entry in candidates {
            if total <= max_bytes {
                break;
            }

            if self.storage.delete(cache_name, &entry.key).await? {
                evicted += 1;
            } else {
                debug!("Entry '{}' already gone from '{}'", entry.key, cache_name);
            }
            self.index.remove(cache_name, &entry.key).await?;
            total = total.saturating_sub(entry.size);
        }

        info!(
            "LRU eviction: removed {} entries from '{}', {} bytes remain (budget {})",
            evicted, cache_name, total, max_bytes
        );
        Ok(evicted)
    }

    // == Is Over Limit ==
    /// Returns true if the cache's full body size exceeds `max_bytes`.
    pub async fn is_over_limit(&self, cache_name: &str, max_bytes: u64) -> Result<bool> {
        Ok(compute_cache_size(self.storage.as_ref(), cache_name).await? > max_bytes)
    }
}
