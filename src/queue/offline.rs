//! Offline Queue Module
//!
//! Persists mutating operations attempted while offline so a sync process
//! can replay them later.

use std::future::Future;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::Request;
use crate::error::{OfflineError, Result};
use crate::storage::{Database, QUEUE_STORE};

/// Request headers worth replaying.
const REPLAYED_HEADERS: &[&str] = &["content-type", "accept", "authorization"];

// == Queue Item ==
/// A deferred operation: a caller-assigned id plus arbitrary payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl QueueItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn str_field(&self, name: &str) -> Result<&str> {
        self.field(name).and_then(Value::as_str).ok_or_else(|| {
            OfflineError::InvalidRequest(format!("queued item '{}' has no '{}'", self.id, name))
        })
    }

    /// Captures a mutating request that could not reach the network.
    ///
    /// The body is kept base64-encoded under `body`.
    pub fn from_request(
        id: impl Into<String>,
        request: &Request,
        queued_at: DateTime<Utc>,
    ) -> Self {
        let headers: Map<String, Value> = request
            .headers
            .iter()
            .filter(|(name, _)| REPLAYED_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
            .map(|(name, value)| (name.to_ascii_lowercase(), Value::from(value.as_str())))
            .collect();

        Self::new(id)
            .with_field("method", request.method.as_str())
            .with_field("url", request.url.as_str())
            .with_field("headers", headers)
            .with_field("body", STANDARD.encode(&request.body))
            .with_field("queued_at", queued_at.to_rfc3339())
    }

    /// Rebuilds the request captured by [`QueueItem::from_request`].
    ///
    /// # Errors
    /// `InvalidRequest` if the item does not describe a request.
    pub fn to_request(&self) -> Result<Request> {
        let url = Url::parse(self.str_field("url")?).map_err(|e| {
            OfflineError::InvalidRequest(format!("queued item '{}': {}", self.id, e))
        })?;
        let mut request = Request::new(self.str_field("method")?, url);

        if let Some(headers) = self.field("headers").and_then(Value::as_object) {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.with_header(name.as_str(), value);
                }
            }
        }
        if let Some(body) = self.field("body").and_then(Value::as_str) {
            let body = STANDARD.decode(body).map_err(|e| {
                OfflineError::InvalidRequest(format!("queued item '{}': {}", self.id, e))
            })?;
            request = request.with_body(body);
        }
        Ok(request)
    }
}

/// Outcome of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Items replayed and removed from the queue
    pub replayed: usize,
    /// Ids of items whose replay failed; they stay queued
    pub failed: Vec<String>,
}

// == Offline Queue ==
/// Queue of pending operations over the `mutation-queue` store.
///
/// Only durability is guaranteed here. Retry policy belongs to whoever
/// drains the queue.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    db: Database,
}

impl OfflineQueue {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // == Enqueue ==
    /// Stores an item. An existing item with the same id is replaced.
    pub async fn enqueue(&self, item: &QueueItem) -> Result<()> {
        self.db.put_as(QUEUE_STORE, item).await?;
        debug!("Queued operation '{}'", item.id);
        Ok(())
    }

    // == Dequeue All ==
    /// Returns every pending item, in no particular order.
    pub async fn dequeue_all(&self) -> Result<Vec<QueueItem>> {
        self.db.get_all_as(QUEUE_STORE).await
    }

    // == Remove ==
    /// Drops an item after it has been replayed. Unknown ids are a no-op.
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.db.remove(QUEUE_STORE, id).await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.db.get_all(QUEUE_STORE).await?.len())
    }

    // == Replay ==
    /// Sends every pending item through `send`, removing the ones that
    /// succeed. Failed items stay queued for the next pass.
    pub async fn replay<F, Fut>(&self, mut send: F) -> Result<ReplayReport>
    where
        F: FnMut(QueueItem) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut report = ReplayReport::default();

        for item in self.dequeue_all().await? {
            let id = item.id.clone();
            match send(item).await {
                Ok(()) => {
                    self.remove(&id).await?;
                    report.replayed += 1;
                }
                Err(e) => {
                    warn!("Replay of '{}' failed: {}", id, e);
                    report.failed.push(id);
                }
            }
        }

        info!(
            "Queue replay: {} replayed, {} still pending",
            report.replayed,
            report.failed.len()
        );
        Ok(report)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OfflineError;
    use crate::storage::{DatabaseSchema, MemoryBackend, EVENT_LOG_STORE};
    use serde_json::json;
    use std::sync::Arc;

    async fn open_db() -> Database {
        Database::open(Arc::new(MemoryBackend::new()), DatabaseSchema::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_dequeue_remove() {
        let queue = OfflineQueue::new(open_db().await);
        queue
            .enqueue(&QueueItem::new("x").with_field("kind", "create-character"))
            .await
            .unwrap();

        let items = queue.dequeue_all().await.unwrap();
        assert!(items.iter().any(|item| item.id == "x"));

        queue.remove("x").await.unwrap();
        assert!(queue.dequeue_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_id_overwrites() {
        let queue = OfflineQueue::new(open_db().await);
        queue
            .enqueue(&QueueItem::new("op").with_field("hp", 10))
            .await
            .unwrap();
        queue
            .enqueue(&QueueItem::new("op").with_field("hp", 12))
            .await
            .unwrap();

        let items = queue.dequeue_all().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].field("hp"), Some(&json!(12)));
    }

    #[tokio::test]
    async fn test_queue_store_isolated_from_event_log() {
        let db = open_db().await;
        let queue = OfflineQueue::new(db.clone());
        queue.enqueue(&QueueItem::new("dup")).await.unwrap();

        assert!(db.get(EVENT_LOG_STORE, "dup").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payload_round_trips_through_store() {
        let db = open_db().await;
        db.put(
            QUEUE_STORE,
            json!({"id": "raw", "method": "POST", "url": "/api/items"}),
        )
        .await
        .unwrap();

        let items = OfflineQueue::new(db).dequeue_all().await.unwrap();
        assert_eq!(items[0].field("method"), Some(&json!("POST")));
        assert!(items[0].field("id").is_none());
    }

    #[tokio::test]
    async fn test_replay_keeps_failures() {
        let queue = OfflineQueue::new(open_db().await);
        for id in ["ok-1", "bad", "ok-2"] {
            queue.enqueue(&QueueItem::new(id)).await.unwrap();
        }

        let report = queue
            .replay(|item| async move {
                if item.id == "bad" {
                    Err(OfflineError::NetworkFailure("still offline".into()))
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(report.replayed, 2);
        assert_eq!(report.failed, vec!["bad".to_string()]);
        let remaining = queue.dequeue_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "bad");
    }

    #[test]
    fn test_request_capture_restores_method_body_and_headers() {
        let url = Url::parse("http://localhost:3000/api/characters").unwrap();
        let request = Request::new("POST", url)
            .with_header("Content-Type", "application/json")
            .with_header("Cookie", "session=1")
            .with_body(r#"{"name":"Vex"}"#);

        let item = QueueItem::from_request("op-1", &request, Utc::now());
        assert_eq!(item.field("method"), Some(&json!("POST")));
        assert!(item.field("queued_at").is_some());

        let restored = item.to_request().unwrap();
        assert_eq!(restored.method, "POST");
        assert_eq!(restored.url, request.url);
        assert_eq!(restored.body, request.body);
        assert_eq!(restored.header("content-type"), Some("application/json"));
        assert!(restored.header("cookie").is_none());
    }

    #[test]
    fn test_to_request_rejects_plain_items() {
        let item = QueueItem::new("note").with_field("kind", "create-character");
        assert!(matches!(
            item.to_request(),
            Err(OfflineError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_unknown_id() {
        let queue = OfflineQueue::new(open_db().await);
        queue.remove("never-queued").await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 0);
    }
}
