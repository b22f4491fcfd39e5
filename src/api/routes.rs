//! API Routes
//!
//! Configures the Axum router with the worker control endpoints and the
//! fetch proxy.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    client_messages_handler, connect_client_handler, disconnect_client_handler,
    enqueue_handler, evict_handler, health_handler, list_queue_handler, message_handler,
    proxy_handler, remove_queue_handler, stats_handler, sync_queue_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /sw/message` - Post a page message to the worker
/// - `POST /sw/clients` - Open a client
/// - `DELETE /sw/clients/:id` - Close a client
/// - `GET /sw/clients/:id/messages` - Drain a client's mailbox
/// - `GET /sw/stats` - Worker state and cache statistics
/// - `POST /sw/evict` - Trim a cache to a byte budget
/// - `GET /queue` - List queued operations
/// - `POST /queue` - Queue an operation
/// - `DELETE /queue/:id` - Drop a queued operation
/// - `POST /queue/sync` - Replay the queue
/// - `GET /health` - Health check endpoint
/// - anything else - Answered by the worker's fetch handler
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/sw/message", post(message_handler))
        .route("/sw/clients", post(connect_client_handler))
        .route("/sw/clients/:id", delete(disconnect_client_handler))
        .route("/sw/clients/:id/messages", get(client_messages_handler))
        .route("/sw/stats", get(stats_handler))
        .route("/sw/evict", post(evict_handler))
        .route("/queue", get(list_queue_handler).post(enqueue_handler))
        .route("/queue/sync", post(sync_queue_handler))
        .route("/queue/:id", delete(remove_queue_handler))
        .route("/health", get(health_handler))
        .fallback(proxy_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemoryCacheStorage, Request as WorkerRequest, Response};
    use crate::error::{OfflineError, Result};
    use crate::queue::OfflineQueue;
    use crate::storage::{Database, DatabaseSchema, MemoryBackend};
    use crate::worker::{LifecycleController, Network, WorkerConfig};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;
    use url::Url;

    struct Unreachable;

    #[async_trait]
    impl Network for Unreachable {
        async fn fetch(&self, _request: &WorkerRequest) -> Result<Response> {
            Err(OfflineError::NetworkFailure("unreachable".into()))
        }
    }

    async fn create_test_app() -> Router {
        let db = Database::open(Arc::new(MemoryBackend::new()), DatabaseSchema::default())
            .await
            .unwrap();
        let caches = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(Unreachable);
        let config = WorkerConfig::new("1", Url::parse("http://localhost:3000").unwrap());
        let controller = Arc::new(LifecycleController::new(
            config,
            caches.clone(),
            network.clone(),
            db.clone(),
            Arc::new(ManualClock::new(1)),
        ));
        create_router(AppState::new(controller, caches, network, OfflineQueue::new(db)))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/sw/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_client_not_found() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/sw/clients/{}/messages", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_offline_get_is_bad_gateway() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/campaigns")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_offline_write_is_accepted() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/campaigns")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"Shattered Isles"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
