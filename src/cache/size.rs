//! Size Estimator Module
//!
//! Byte accounting for cached responses.

use crate::cache::{CacheStorage, Response};
use crate::error::Result;

/// Byte length of a response body.
///
/// Borrows the response; the caller's value stays usable.
pub fn estimate_response_size(response: &Response) -> u64 {
    response.body.len() as u64
}

/// Sums the body sizes of every entry in a named cache.
///
/// Reads every entry, so callers should run it on eviction checks only,
/// never per request. Entries removed concurrently are skipped.
pub async fn compute_cache_size(storage: &dyn CacheStorage, cache_name: &str) -> Result<u64> {
    let mut total = 0;
    for key in storage.keys(cache_name).await? {
        if let Some(response) = storage.match_key(cache_name, &key).await? {
            total += estimate_response_size(&response);
        }
    }
    Ok(total)
}
