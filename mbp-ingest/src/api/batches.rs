//! Batch API handlers
//!
//! Create, inspect, edit, upload and clear batches. Upload returns 202 once
//! the ready gate passes; the drain runs in the background and progress is
//! streamed on `/batches/:batch_id/events`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{BatchDefaults, BatchResult, ItemView},
    services::RejectedInput,
    workflow::{BatchPhase, BatchSession, BatchSnapshot},
    AppState,
};

/// POST /batches/links request
#[derive(Debug, Deserialize)]
pub struct CreateLinksRequest {
    pub text: String,
    #[serde(default)]
    pub defaults: BatchDefaults,
}

/// POST /batches/files request
#[derive(Debug, Deserialize)]
pub struct CreateFilesRequest {
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub defaults: BatchDefaults,
}

/// PUT /batches/:batch_id/links request
#[derive(Debug, Deserialize)]
pub struct ReplaceLinksRequest {
    pub text: String,
}

/// POST /batches/:batch_id/files request
#[derive(Debug, Deserialize)]
pub struct AddFilesRequest {
    pub paths: Vec<PathBuf>,
}

/// PATCH /batches/:batch_id/items/:item_id request
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// Response for every call that parses input
#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub batch_id: Uuid,
    pub item_count: usize,
    pub rejected_count: usize,
    pub rejected: Vec<RejectedInput>,
}

/// POST /batches/:batch_id/upload response
#[derive(Debug, Serialize)]
pub struct StartUploadResponse {
    pub batch_id: Uuid,
    pub total: usize,
    pub phase: BatchPhase,
}

/// DELETE /batches/:batch_id response
#[derive(Debug, Serialize)]
pub struct ClearBatchResponse {
    pub batch_id: Uuid,
    pub released: usize,
}

async fn find_session(state: &AppState, batch_id: Uuid) -> ApiResult<Arc<BatchSession>> {
    state
        .sessions
        .get(batch_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Batch not found: {}", batch_id)))
}

async fn parse_response(session: &BatchSession, rejected: Vec<RejectedInput>) -> ParseResponse {
    ParseResponse {
        batch_id: session.batch_id(),
        item_count: session.ledger().len().await,
        rejected_count: rejected.len(),
        rejected,
    }
}

/// POST /batches/links
pub async fn create_link_batch(
    State(state): State<AppState>,
    Json(request): Json<CreateLinksRequest>,
) -> ApiResult<(StatusCode, Json<ParseResponse>)> {
    let session = BatchSession::create_links(&state.pipeline, &request.text, request.defaults).await?;
    state.sessions.insert(Arc::clone(&session)).await;

    let rejected = session.snapshot().await.rejected;
    Ok((StatusCode::CREATED, Json(parse_response(&session, rejected).await)))
}

/// POST /batches/files
pub async fn create_file_batch(
    State(state): State<AppState>,
    Json(request): Json<CreateFilesRequest>,
) -> ApiResult<(StatusCode, Json<ParseResponse>)> {
    let session =
        BatchSession::create_files(&state.pipeline, &request.paths, request.defaults).await?;
    state.sessions.insert(Arc::clone(&session)).await;

    let rejected = session.snapshot().await.rejected;
    Ok((StatusCode::CREATED, Json(parse_response(&session, rejected).await)))
}

/// GET /batches/:batch_id
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<BatchSnapshot>> {
    let session = find_session(&state, batch_id).await?;
    Ok(Json(session.snapshot().await))
}

/// PUT /batches/:batch_id/links
pub async fn replace_links(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<ReplaceLinksRequest>,
) -> ApiResult<Json<ParseResponse>> {
    let session = find_session(&state, batch_id).await?;
    let rejected = session.replace_links(&request.text).await?;
    Ok(Json(parse_response(&session, rejected).await))
}

/// POST /batches/:batch_id/files
pub async fn add_files(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<AddFilesRequest>,
) -> ApiResult<Json<ParseResponse>> {
    let session = find_session(&state, batch_id).await?;
    let rejected = session.add_files(&request.paths).await?;
    Ok(Json(parse_response(&session, rejected).await))
}

/// PATCH /batches/:batch_id/items/:item_id
pub async fn update_item(
    State(state): State<AppState>,
    Path((batch_id, item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateItemRequest>,
) -> ApiResult<Json<ItemView>> {
    if request.title.is_none() && request.url.is_none() {
        return Err(ApiError::BadRequest(
            "Nothing to update: provide title and/or url".to_string(),
        ));
    }

    let session = find_session(&state, batch_id).await?;
    let view = session
        .update_item(item_id, request.title.as_deref(), request.url.as_deref())
        .await?;
    Ok(Json(view))
}

/// DELETE /batches/:batch_id/items/:item_id
pub async fn remove_item(
    State(state): State<AppState>,
    Path((batch_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let session = find_session(&state, batch_id).await?;
    session.remove_item(item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /batches/:batch_id/defaults
pub async fn set_defaults(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(defaults): Json<BatchDefaults>,
) -> ApiResult<Json<BatchDefaults>> {
    let session = find_session(&state, batch_id).await?;
    session.set_defaults(defaults).await?;
    Ok(Json(session.defaults().await))
}

/// POST /batches/:batch_id/upload
///
/// Returns 202 Accepted once the ready gate passes; 409 when it does not.
pub async fn start_upload(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<StartUploadResponse>)> {
    let session = find_session(&state, batch_id).await?;

    let total = match session.start_upload().await {
        Ok(total) => total,
        Err(e) => {
            tracing::info!(batch_id = %batch_id, error = %e, "Upload rejected");
            *state.last_error.write().await = Some(e.to_string());
            return Err(e.into());
        }
    };

    tracing::info!(batch_id = %batch_id, total, "Upload accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(StartUploadResponse {
            batch_id,
            total,
            phase: BatchPhase::Uploading,
        }),
    ))
}

/// GET /batches/:batch_id/result
pub async fn get_result(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<BatchResult>> {
    let session = find_session(&state, batch_id).await?;
    if session.phase().await == BatchPhase::Uploading {
        return Err(ApiError::Conflict("Upload still running".to_string()));
    }

    session
        .result()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No upload result for batch {}", batch_id)))
}

/// DELETE /batches/:batch_id
pub async fn clear_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<ClearBatchResponse>> {
    let session = find_session(&state, batch_id).await?;
    let released = session.clear().await?;
    state.sessions.remove(batch_id).await;

    Ok(Json(ClearBatchResponse { batch_id, released }))
}

/// Build batch routes
pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/batches/links", post(create_link_batch))
        .route("/batches/files", post(create_file_batch))
        .route("/batches/:batch_id", get(get_batch).delete(clear_batch))
        .route("/batches/:batch_id/links", put(replace_links))
        .route("/batches/:batch_id/files", post(add_files))
        .route(
            "/batches/:batch_id/items/:item_id",
            patch(update_item).delete(remove_item),
        )
        .route("/batches/:batch_id/defaults", put(set_defaults))
        .route("/batches/:batch_id/upload", post(start_upload))
        .route("/batches/:batch_id/result", get(get_result))
}
