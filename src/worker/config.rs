//! Worker Configuration Module
//!
//! Immutable settings handed to the lifecycle controller at construction.

use url::Url;

use crate::cache::{AssetMatch, DEFAULT_MAX_BYTES};
use crate::error::{OfflineError, Result};

/// App shell fetched at install time.
pub const DEFAULT_PRECACHE_MANIFEST: &[&str] = &["/", "/favicon.ico"];

// == Cache Names ==
/// Versioned cache names. Any other cache is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub precache: String,
    pub runtime: String,
    pub queue: String,
}

impl CacheNames {
    pub fn for_version(version: &str) -> Self {
        Self {
            precache: format!("precache-v{}", version),
            runtime: format!("runtime-v{}", version),
            queue: format!("queue-v{}", version),
        }
    }

    pub fn allow_list(&self) -> [&str; 3] {
        [&self.precache, &self.runtime, &self.queue]
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.allow_list().contains(&name)
    }
}

// == Worker Config ==
/// Everything the controller needs to know up front.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Deploy version baked into cache names
    pub version: String,
    /// Origin the worker controls; manifest paths resolve against it
    pub origin: Url,
    pub precache_manifest: Vec<String>,
    pub asset_match: AssetMatch,
    /// Byte budget of the runtime cache
    pub max_runtime_bytes: u64,
    /// Runtime-cache writes between two opportunistic budget checks
    pub eviction_check_every: u64,
    /// Activate straight after install instead of waiting
    pub skip_waiting_on_install: bool,
}

impl WorkerConfig {
    // == Constructor ==
    pub fn new(version: impl Into<String>, origin: Url) -> Self {
        Self {
            version: version.into(),
            origin,
            precache_manifest: DEFAULT_PRECACHE_MANIFEST
                .iter()
                .map(|path| path.to_string())
                .collect(),
            asset_match: AssetMatch::default(),
            max_runtime_bytes: DEFAULT_MAX_BYTES,
            eviction_check_every: 16,
            skip_waiting_on_install: true,
        }
    }

    pub fn with_manifest<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache_manifest = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_asset_match(mut self, mode: AssetMatch) -> Self {
        self.asset_match = mode;
        self
    }

    pub fn with_max_runtime_bytes(mut self, bytes: u64) -> Self {
        self.max_runtime_bytes = bytes;
        self
    }

    pub fn with_eviction_check_every(mut self, writes: u64) -> Self {
        self.eviction_check_every = writes;
        self
    }

    pub fn with_skip_waiting(mut self, skip: bool) -> Self {
        self.skip_waiting_on_install = skip;
        self
    }

    pub fn cache_names(&self) -> CacheNames {
        CacheNames::for_version(&self.version)
    }

    /// Resolves the manifest against the origin.
    pub fn precache_urls(&self) -> Result<Vec<Url>> {
        self.precache_manifest
            .iter()
            .map(|path| {
                self.origin.join(path).map_err(|e| {
                    OfflineError::InvalidRequest(format!("bad manifest path '{}': {}", path, e))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_names_follow_version() {
        let names = CacheNames::for_version("7");
        assert_eq!(names.precache, "precache-v7");
        assert_eq!(names.runtime, "runtime-v7");
        assert_eq!(names.queue, "queue-v7");
        assert!(names.is_current("runtime-v7"));
        assert!(!names.is_current("runtime-v6"));
        assert!(!names.is_current("precache-v70"));
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::new("1", Url::parse("http://localhost:3000").unwrap());
        assert_eq!(config.precache_manifest, vec!["/", "/favicon.ico"]);
        assert_eq!(config.max_runtime_bytes, 50 * 1024 * 1024);
        assert_eq!(config.asset_match, AssetMatch::Suffix);
        assert!(config.skip_waiting_on_install);
    }

    #[test]
    fn test_precache_urls_resolve_against_origin() {
        let config = WorkerConfig::new("1", Url::parse("https://app.example").unwrap())
            .with_manifest(["/", "/static/app.js"]);
        let urls = config.precache_urls().unwrap();
        assert_eq!(urls[0].as_str(), "https://app.example/");
        assert_eq!(urls[1].as_str(), "https://app.example/static/app.js");
    }
}
