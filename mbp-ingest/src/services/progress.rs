//! Upload progress observers
//!
//! The executor reports each finished item through `ProgressObserver`, in
//! upload order, without knowing how progress is rendered.

use crate::models::ItemOutcome;
use chrono::Utc;
use mbp_common::events::{BatchEvent, EventBus};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Receives `(completed, total, outcome)` once per finished upload
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize, outcome: &ItemOutcome);
}

impl<F> ProgressObserver for F
where
    F: Fn(usize, usize, &ItemOutcome) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize, outcome: &ItemOutcome) {
        self(completed, total, outcome)
    }
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _completed: usize, _total: usize, _outcome: &ItemOutcome) {}
}

/// Progress update sent over a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub outcome: ItemOutcome,
}

/// Forwards progress to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, completed: usize, total: usize, outcome: &ItemOutcome) {
        if self
            .tx
            .send(ProgressUpdate {
                completed,
                total,
                outcome: outcome.clone(),
            })
            .is_err()
        {
            tracing::debug!("Progress receiver dropped");
        }
    }
}

/// Publishes `UploadProgress` events for SSE clients
#[derive(Clone)]
pub struct EventBusObserver {
    batch_id: Uuid,
    bus: EventBus,
}

impl EventBusObserver {
    pub fn new(batch_id: Uuid, bus: EventBus) -> Self {
        Self { batch_id, bus }
    }
}

impl ProgressObserver for EventBusObserver {
    fn on_progress(&self, completed: usize, total: usize, outcome: &ItemOutcome) {
        self.bus.emit_lossy(BatchEvent::UploadProgress {
            batch_id: self.batch_id,
            completed,
            total,
            outcome: outcome.clone(),
            timestamp: Utc::now(),
        });
    }
}
