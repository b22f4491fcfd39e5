//! HTTP Handlers
//!
//! Request handlers for the host API endpoints and the fetch proxy.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Path, Request as HttpRequest, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
    Json,
};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{compute_cache_size, CacheStorage, Request, Response};
use crate::config::Config;
use crate::error::{OfflineError, Result};
use crate::models::{
    ClientResponse, EnqueueRequest, EvictRequest, EvictResponse, HealthResponse,
    MessagesResponse, QueueResponse, QueuedResponse, StatsResponse, SyncResponse,
};
use crate::queue::{OfflineQueue, QueueItem};
use crate::worker::{LifecycleController, MessageOutcome, Network, WorkerState};

/// Header a page may set to choose the queue id of an offline write.
pub const OPERATION_ID_HEADER: &str = "x-operation-id";

/// Largest request body the proxy buffers.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<LifecycleController>,
    pub caches: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub queue: OfflineQueue,
    /// Whether offline non-GET requests are queued instead of failing
    pub queue_offline_writes: bool,
    /// Set when the disk database failed to open and the host fell back to
    /// memory. Writes are then never acknowledged as queued.
    pub storage_degraded: Option<String>,
}

impl AppState {
    /// Creates a new AppState around an already constructed worker
    pub fn new(
        controller: Arc<LifecycleController>,
        caches: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        queue: OfflineQueue,
    ) -> Self {
        Self {
            controller,
            caches,
            network,
            queue,
            queue_offline_writes: true,
            storage_degraded: None,
        }
    }

    /// Marks the database as a volatile stand-in for the configured one
    pub fn with_storage_degraded(mut self, reason: impl Into<String>) -> Self {
        self.storage_degraded = Some(reason.into());
        self
    }

    fn ensure_durable_queue(&self) -> Result<()> {
        match &self.storage_degraded {
            Some(reason) => Err(OfflineError::StorageUnavailable(format!(
                "queue is not durable: {}",
                reason
            ))),
            None => Ok(()),
        }
    }

    pub fn with_queue_offline_writes(mut self, enabled: bool) -> Self {
        self.queue_offline_writes = enabled;
        self
    }

    /// Applies host settings that live outside the worker
    pub fn configured(self, config: &Config) -> Self {
        self.with_queue_offline_writes(config.queue_offline_writes)
    }
}

// == Fetch Proxy ==
/// Fallback handler: every request not matched by the API goes through the
/// worker's fetch handler.
///
/// A non-GET request that fails on the network is queued and answered
/// `202 Accepted`, so the page can carry on offline. With degraded storage
/// the network error is returned instead.
pub async fn proxy_handler(
    State(state): State<AppState>,
    request: HttpRequest,
) -> Result<HttpResponse> {
    let request = into_worker_request(state.controller.config().origin.clone(), request).await?;

    match state.controller.fetch(&request).await {
        Ok(response) => into_http_response(response),
        Err(OfflineError::NetworkFailure(reason))
            if state.queue_offline_writes
                && state.storage_degraded.is_none()
                && !request.is_get() =>
        {
            let id = request
                .header(OPERATION_ID_HEADER)
                .map(String::from)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let item = QueueItem::from_request(id.clone(), &request, chrono::Utc::now());
            state.queue.enqueue(&item).await?;
            info!(
                "Queued offline {} {} as '{}' ({})",
                request.method, request.url, id, reason
            );
            Ok((StatusCode::ACCEPTED, Json(QueuedResponse::new(id))).into_response())
        }
        Err(e) => Err(e),
    }
}

async fn into_worker_request(origin: url::Url, request: HttpRequest) -> Result<Request> {
    let (parts, body) = request.into_parts();
    // The path is set verbatim, never resolved against the origin: a path
    // such as `//other-host/x` must not switch the target host.
    let mut url = origin.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());
    if url.origin() != origin.origin() {
        return Err(OfflineError::InvalidRequest(format!(
            "path '{}' leaves the origin",
            parts.uri.path()
        )));
    }

    let mut worker_request = Request::new(parts.method.as_str(), url);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            worker_request = worker_request.with_header(name.as_str(), value);
        }
    }

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| OfflineError::InvalidRequest(format!("unreadable body: {}", e)))?;
    Ok(worker_request.with_body(body))
}

fn into_http_response(response: Response) -> Result<HttpResponse> {
    let status = StatusCode::from_u16(response.status)
        .map_err(|e| OfflineError::Internal(format!("bad status {}: {}", response.status, e)))?;

    let mut http_response = HttpResponse::new(Body::from(response.body));
    *http_response.status_mut() = status;
    let headers = http_response.headers_mut();
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    Ok(http_response)
}

// == Worker Endpoints ==
/// Handler for POST /sw/message
///
/// Accepts any body; anything that is not a recognized command is ignored.
pub async fn message_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageOutcome>> {
    let raw: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let outcome = state.controller.message(&raw).await?;
    Ok(Json(outcome))
}

/// Handler for POST /sw/clients
///
/// Opens a client. An active worker controls it straight away.
pub async fn connect_client_handler(State(state): State<AppState>) -> Json<ClientResponse> {
    let clients = state.controller.clients();
    let id = clients.connect().await;
    if state.controller.state().await == WorkerState::Activated {
        clients.claim().await;
    }
    Json(ClientResponse {
        id,
        controlled: clients.is_controlled(id).await,
    })
}

/// Handler for GET /sw/clients/:id/messages
///
/// Drains the pending messages of a client.
pub async fn client_messages_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessagesResponse>> {
    let messages = state
        .controller
        .clients()
        .drain(id)
        .await
        .ok_or_else(|| OfflineError::NotFound(format!("client '{}'", id)))?;
    Ok(Json(MessagesResponse { messages }))
}

/// Handler for DELETE /sw/clients/:id
pub async fn disconnect_client_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if state.controller.clients().disconnect(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(OfflineError::NotFound(format!("client '{}'", id)))
    }
}

/// Handler for GET /sw/stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let controller = &state.controller;
    let runtime_bytes =
        compute_cache_size(state.caches.as_ref(), &controller.cache_names().runtime).await?;
    Ok(Json(StatsResponse::new(
        controller.state().await,
        controller.config().version.clone(),
        &controller.stats().await,
        runtime_bytes,
    )
    .with_storage_degraded(state.storage_degraded.is_some())))
}

/// Handler for POST /sw/evict
///
/// An empty body trims the runtime cache to the configured budget.
pub async fn evict_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<EvictResponse>> {
    let request: EvictRequest = if body.is_empty() {
        EvictRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| OfflineError::InvalidRequest(format!("bad evict request: {}", e)))?
    };

    let controller = &state.controller;
    let cache = request
        .cache
        .unwrap_or_else(|| controller.cache_names().runtime.clone());
    let max_bytes = request
        .max_bytes
        .unwrap_or(controller.config().max_runtime_bytes);

    let evicted = controller.evict_to_fit(&cache, max_bytes).await?;
    let remaining_bytes = compute_cache_size(state.caches.as_ref(), &cache).await?;
    debug!("Manual eviction of '{}': {} removed", cache, evicted);

    Ok(Json(EvictResponse {
        cache,
        evicted,
        remaining_bytes,
    }))
}

// == Queue Endpoints ==
/// Handler for GET /queue
pub async fn list_queue_handler(State(state): State<AppState>) -> Result<Json<QueueResponse>> {
    let items = state.queue.dequeue_all().await?;
    Ok(Json(QueueResponse::new(items)))
}

/// Handler for POST /queue
///
/// Stores an arbitrary pending operation. An existing id is replaced.
/// Refused with 503 while storage is degraded.
pub async fn enqueue_handler(
    State(state): State<AppState>,
    Json(payload): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>)> {
    if let Some(error) = payload.validate() {
        return Err(OfflineError::InvalidRequest(error));
    }
    state.ensure_durable_queue()?;

    let item = payload.into_item();
    state.queue.enqueue(&item).await?;
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse::new(item.id))))
}

/// Handler for DELETE /queue/:id
///
/// Idempotent: unknown ids succeed too.
pub async fn remove_queue_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.queue.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /queue/sync
///
/// Replays every queued request over the network. Items that fail, or that
/// do not describe a request, stay queued.
pub async fn sync_queue_handler(State(state): State<AppState>) -> Result<Json<SyncResponse>> {
    let network = state.network.clone();
    let report = state
        .queue
        .replay(|item| {
            let network = network.clone();
            async move {
                let request = item.to_request()?;
                let response = network.fetch(&request).await?;
                if response.status >= 500 {
                    return Err(OfflineError::NetworkFailure(format!(
                        "{} {} answered {}",
                        request.method, request.url, response.status
                    )));
                }
                Ok(())
            }
        })
        .await?;

    let remaining = state.queue.len().await?;
    Ok(Json(SyncResponse::new(report, remaining)))
}

/// Handler for GET /health
///
/// Returns health status of the server, "degraded" when the disk database
/// is unavailable.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    match &state.storage_degraded {
        Some(reason) => Json(HealthResponse::degraded(reason.clone())),
        None => Json(HealthResponse::healthy()),
    }
}
