//! Request DTOs for the host API

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::queue::QueueItem;

/// Request body for enqueueing a pending mutation (POST /queue)
///
/// Any fields besides `id` are stored as the item's payload.
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueRequest {
    /// Item key; a fresh one is generated when absent
    pub id: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl EnqueueRequest {
    /// Validates the request
    ///
    /// Returns None if valid, or Some(error_message) if invalid
    pub fn validate(&self) -> Option<String> {
        match &self.id {
            Some(id) if id.trim().is_empty() => Some("Id cannot be empty".to_string()),
            _ => None,
        }
    }

    /// Converts into a queue item, generating an id when none was given.
    pub fn into_item(self) -> QueueItem {
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        QueueItem {
            id,
            fields: self.payload,
        }
    }
}

/// Request body for a manual eviction (POST /sw/evict)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvictRequest {
    /// Cache to trim; the runtime cache when absent
    pub cache: Option<String>,
    /// Byte budget; the configured budget when absent
    pub max_bytes: Option<u64>,
}
