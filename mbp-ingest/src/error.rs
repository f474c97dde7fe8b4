//! Error types for mbp-ingest
//!
//! `IngestError` covers pipeline-level failures that escalate to the caller
//! (ready-gate violations, invalid transitions, unknown items). Per-item
//! resolution and creation failures never appear here; they are absorbed into
//! item state and the `BatchResult`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mbp_common::events::ItemStatus;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum IngestError {
    /// Batch not eligible to start uploading; nothing was submitted
    #[error("Batch not ready for upload: {0}")]
    Precondition(String),

    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Invalid transition for item {item_id}: {from:?} -> {to}")]
    InvalidTransition {
        item_id: Uuid,
        from: ItemStatus,
        to: &'static str,
    },

    /// Ledger is locked by a running upload
    #[error("Upload in progress; batch cannot be modified")]
    UploadInProgress,

    #[error("Batch capacity exceeded: {attempted} items, limit {limit}")]
    CapacityExceeded { attempted: usize, limit: usize },

    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Operation only applies to the other source kind (e.g. URL edit on a file item)
    #[error("Operation not supported for this item: {0}")]
    WrongSourceKind(String),

    #[error("Common error: {0}")]
    Common(#[from] mbp_common::Error),
}

/// Result type for pipeline operations
pub type IngestResult<T> = Result<T, IngestError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g., upload already running, batch not ready
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::ItemNotFound(_) => ApiError::NotFound(err.to_string()),
            IngestError::Precondition(_)
            | IngestError::InvalidTransition { .. }
            | IngestError::UploadInProgress => ApiError::Conflict(err.to_string()),
            IngestError::CapacityExceeded { .. }
            | IngestError::InvalidTitle(_)
            | IngestError::InvalidUrl(_)
            | IngestError::WrongSourceKind(_) => ApiError::BadRequest(err.to_string()),
            IngestError::Common(mbp_common::Error::NotFound(msg)) => ApiError::NotFound(msg),
            IngestError::Common(mbp_common::Error::InvalidInput(msg)) => ApiError::BadRequest(msg),
            IngestError::Common(other) => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
