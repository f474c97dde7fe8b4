//! Server-Sent Events for batch progress
//!
//! Streams the events of one batch: item updates during resolution and
//! editing, then upload start, per-item progress and completion. Idle
//! connections are kept open by the SSE keep-alive comment.

use crate::{error::ApiResult, AppState};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use mbp_common::events::BatchEvent;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// GET /batches/:batch_id/events
pub async fn batch_event_stream(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if state.sessions.get(batch_id).await.is_none() {
        return Err(crate::error::ApiError::NotFound(format!(
            "Batch not found: {}",
            batch_id
        )));
    }

    info!(batch_id = %batch_id, "SSE client connected");
    let events = batch_events(state.event_bus.subscribe(), batch_id);

    let stream = events.filter_map(move |event| async move {
        let event_type = event.event_type();
        match serde_json::to_string(&event) {
            Ok(json) => {
                debug!(batch_id = %batch_id, event_type, "SSE: forwarding event");
                Some(Ok(Event::default().event(event_type).data(json)))
            }
            Err(e) => {
                warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    ))
}

/// Events of one batch, ending when the bus closes
fn batch_events(
    mut rx: broadcast::Receiver<BatchEvent>,
    batch_id: Uuid,
) -> impl Stream<Item = BatchEvent> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) if event.batch_id() == batch_id => yield event,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(batch_id = %batch_id, skipped, "SSE client lagging; events dropped");
                }
                Err(RecvError::Closed) => {
                    info!(batch_id = %batch_id, "Event bus closed; ending SSE stream");
                    break;
                }
            }
        }
    }
}
