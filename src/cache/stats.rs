//! Cache Statistics Module
//!
//! Tracks fetch-handler metrics: hits, misses, network fallbacks and
//! evictions.

use serde::Serialize;

// == Cache Stats ==
/// Counters maintained by the fetch handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests answered from a cache without touching the network
    pub hits: u64,
    /// Cache-first requests that had to go to the network
    pub misses: u64,
    /// Network-first requests answered from cache after a network failure
    pub network_fallbacks: u64,
    /// Entries removed by LRU eviction
    pub evictions: u64,
    /// Entries written by the last successful install
    pub precached: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_fallback(&mut self) {
        self.network_fallbacks += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn set_precached(&mut self, count: usize) {
        self.precached = count;
    }
}
