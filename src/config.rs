//! Configuration Module
//!
//! Handles loading the host configuration from environment variables.

use std::env;
use std::path::PathBuf;

use url::Url;

use crate::cache::{AssetMatch, DEFAULT_MAX_BYTES};
use crate::error::{OfflineError, Result};
use crate::worker::{WorkerConfig, DEFAULT_PRECACHE_MANIFEST};

/// Host configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deploy version baked into cache names
    pub cache_version: String,
    /// Origin the worker controls
    pub origin: String,
    /// Server that same-origin requests are forwarded to
    pub upstream_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Byte budget of the runtime cache
    pub max_cache_bytes: u64,
    /// Background eviction interval in seconds
    pub eviction_interval: u64,
    /// Directory of the file-backed database; in-memory when unset
    pub data_dir: Option<PathBuf>,
    /// Comma-separated paths fetched at install time
    pub precache_manifest: Vec<String>,
    /// Static asset recognition mode (`suffix` or `substring`)
    pub asset_match: String,
    /// Queue non-GET requests that fail offline instead of failing them
    pub queue_offline_writes: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_VERSION` - Cache version (default: 1)
    /// - `ORIGIN` - Controlled origin (default: http://localhost:3000)
    /// - `UPSTREAM_URL` - Upstream server (default: http://localhost:8080)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `MAX_CACHE_BYTES` - Runtime cache budget (default: 52428800)
    /// - `EVICTION_INTERVAL` - Eviction frequency in seconds (default: 30)
    /// - `DATA_DIR` - Database directory (default: unset, in-memory)
    /// - `PRECACHE_MANIFEST` - Install-time paths (default: "/,/favicon.ico")
    /// - `ASSET_MATCH` - `suffix` or `substring` (default: suffix)
    /// - `QUEUE_OFFLINE_WRITES` - Queue offline writes (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_version: env::var("CACHE_VERSION").unwrap_or(defaults.cache_version),
            origin: env::var("ORIGIN").unwrap_or(defaults.origin),
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            max_cache_bytes: env::var("MAX_CACHE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_cache_bytes),
            eviction_interval: env::var("EVICTION_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.eviction_interval),
            data_dir: env::var("DATA_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            precache_manifest: env::var("PRECACHE_MANIFEST")
                .ok()
                .map(|v| parse_manifest(&v))
                .unwrap_or(defaults.precache_manifest),
            asset_match: env::var("ASSET_MATCH").unwrap_or(defaults.asset_match),
            queue_offline_writes: env::var("QUEUE_OFFLINE_WRITES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.queue_offline_writes),
        }
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).map_err(|e| {
            OfflineError::InvalidRequest(format!("bad ORIGIN '{}': {}", self.origin, e))
        })
    }

    pub fn upstream(&self) -> Result<Url> {
        Url::parse(&self.upstream_url).map_err(|e| {
            OfflineError::InvalidRequest(format!("bad UPSTREAM_URL '{}': {}", self.upstream_url, e))
        })
    }

    /// Builds the worker settings.
    ///
    /// # Errors
    /// `InvalidRequest` if the origin or the asset match mode do not parse.
    pub fn worker_config(&self) -> Result<WorkerConfig> {
        let asset_match: AssetMatch = self.asset_match.parse()?;
        Ok(WorkerConfig::new(self.cache_version.clone(), self.origin_url()?)
            .with_manifest(self.precache_manifest.iter().cloned())
            .with_asset_match(asset_match)
            .with_max_runtime_bytes(self.max_cache_bytes))
    }
}

fn parse_manifest(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(String::from)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_version: "1".to_string(),
            origin: "http://localhost:3000".to_string(),
            upstream_url: "http://localhost:8080".to_string(),
            server_port: 3000,
            max_cache_bytes: DEFAULT_MAX_BYTES,
            eviction_interval: 30,
            data_dir: None,
            precache_manifest: DEFAULT_PRECACHE_MANIFEST
                .iter()
                .map(|path| path.to_string())
                .collect(),
            asset_match: "suffix".to_string(),
            queue_offline_writes: true,
        }
    }
}
