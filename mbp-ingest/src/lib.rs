//! mbp-ingest library interface
//!
//! Batch material ingestion: parse a link list or file selection, resolve
//! per-item previews and titles concurrently, then submit items one by one to
//! the creation endpoint with per-item failure isolation.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult, IngestError, IngestResult};

use axum::Router;
use chrono::{DateTime, Utc};
use mbp_common::events::EventBus;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use workflow::{Pipeline, SessionRegistry};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Services shared by every batch
    pub pipeline: Pipeline,
    /// Live batches
    pub sessions: SessionRegistry,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        let event_bus = pipeline.events.clone();
        Self {
            pipeline,
            sessions: SessionRegistry::new(),
            event_bus,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::batch_routes())
        .route("/batches/:batch_id/events", get(api::batch_event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
