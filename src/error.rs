//! Error types for the offline layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Offline Error Enum ==
/// Unified error type for the offline layer.
///
/// Eviction races and malformed client messages are deliberately absent:
/// the evictor swallows the former and the controller ignores the latter.
#[derive(Error, Debug)]
pub enum OfflineError {
    /// Persistent key/value backend could not be opened
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An asset of the precache manifest failed to fetch
    #[error("Precache failed: {0}")]
    PrecacheFailure(String),

    /// Network fetch failed and no cached fallback exists
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Store name not declared in the database schema
    #[error("Unknown store: {0}")]
    UnknownStore(String),

    /// Requested record or client does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Lifecycle operation invoked from the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for OfflineError {
    fn into_response(self) -> Response {
        let status = match &self {
            OfflineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            OfflineError::PrecacheFailure(_) | OfflineError::NetworkFailure(_) => {
                StatusCode::BAD_GATEWAY
            }
            OfflineError::NotFound(_) => StatusCode::NOT_FOUND,
            OfflineError::UnknownStore(_) | OfflineError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            OfflineError::InvalidState(_) => StatusCode::CONFLICT,
            OfflineError::Serialization(_) | OfflineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the offline layer.
pub type Result<T> = std::result::Result<T, OfflineError>;
