//! Response DTOs for the host API

use serde::Serialize;
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::queue::{QueueItem, ReplayReport};
use crate::worker::{WorkerMessage, WorkerState};

/// Response body for the stats endpoint (GET /sw/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Current worker lifecycle state
    pub state: WorkerState,
    /// Deploy version of the worker
    pub version: String,
    pub hits: u64,
    pub misses: u64,
    pub network_fallbacks: u64,
    pub evictions: u64,
    pub precached: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Current size of the runtime cache in bytes
    pub runtime_bytes: u64,
    /// True when the configured disk database could not be opened and
    /// queued writes only live in memory
    pub storage_degraded: bool,
}

impl StatsResponse {
    /// Creates a new StatsResponse from worker statistics
    pub fn new(
        state: WorkerState,
        version: impl Into<String>,
        stats: &CacheStats,
        runtime_bytes: u64,
    ) -> Self {
        Self {
            state,
            version: version.into(),
            hits: stats.hits,
            misses: stats.misses,
            network_fallbacks: stats.network_fallbacks,
            evictions: stats.evictions,
            precached: stats.precached,
            hit_rate: stats.hit_rate(),
            runtime_bytes,
            storage_degraded: false,
        }
    }

    pub fn with_storage_degraded(mut self, degraded: bool) -> Self {
        self.storage_degraded = degraded;
        self
    }
}

/// Response body for a manual eviction (POST /sw/evict)
#[derive(Debug, Clone, Serialize)]
pub struct EvictResponse {
    pub cache: String,
    pub evicted: usize,
    /// Cache size in bytes after eviction
    pub remaining_bytes: u64,
}

/// Response body for a newly connected client (POST /sw/clients)
#[derive(Debug, Clone, Serialize)]
pub struct ClientResponse {
    pub id: Uuid,
    /// Whether the active worker already controls the client
    pub controlled: bool,
}

/// Pending worker messages of a client (GET /sw/clients/:id/messages)
#[derive(Debug, Clone, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<WorkerMessage>,
}

/// Queued operations (GET /queue)
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub count: usize,
    pub items: Vec<QueueItem>,
}

impl QueueResponse {
    pub fn new(items: Vec<QueueItem>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

/// Acknowledgement of a deferred operation (POST /queue, offline writes)
#[derive(Debug, Clone, Serialize)]
pub struct QueuedResponse {
    pub id: String,
    pub message: String,
}

impl QueuedResponse {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            message: format!("Operation '{}' queued for sync", id),
            id,
        }
    }
}

/// Result of replaying the queue (POST /queue/sync)
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub replayed: usize,
    pub failed: Vec<String>,
    /// Items still queued after the pass
    pub remaining: usize,
}

impl SyncResponse {
    pub fn new(report: ReplayReport, remaining: usize) -> Self {
        Self {
            replayed: report.replayed,
            failed: report.failed,
            remaining,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status ("healthy" or "degraded")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Why the durable database is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            storage_error: None,
        }
    }

    /// Health of a host running on a fallback in-memory database
    pub fn degraded(storage_error: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            storage_error: Some(storage_error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_response_copies_counters() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        let resp = StatsResponse::new(WorkerState::Activated, "3", &stats, 42);
        assert!((resp.hit_rate - 0.75).abs() < 0.001);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["state"], "activated");
        assert_eq!(json["runtime_bytes"], 42);
    }

    #[test]
    fn test_queued_response_serialize() {
        let resp = QueuedResponse::new("op-9");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("op-9"));
        assert!(json.contains("queued"));
    }

    #[test]
    fn test_sync_response() {
        let report = ReplayReport {
            replayed: 2,
            failed: vec!["c".to_string()],
        };
        let resp = SyncResponse::new(report, 1);
        assert_eq!(resp.replayed, 2);
        assert_eq!(resp.remaining, 1);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
        assert!(!json.contains("storage_error"));
    }

    #[test]
    fn test_degraded_health_names_storage_error() {
        let json = serde_json::to_value(HealthResponse::degraded("disk full")).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["storage_error"], "disk full");
    }
}
