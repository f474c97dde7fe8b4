//! Event types for the batch pipeline
//!
//! Provides the batch event definitions and the `EventBus` used to fan events
//! out to SSE clients.

mod batch_types;

pub use batch_types::{ItemOutcome, ItemStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Batch pipeline events
///
/// Every variant carries the owning `batch_id` so subscribers can filter a
/// single batch out of the shared bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchEvent {
    /// A batch was parsed and registered
    BatchCreated {
        batch_id: Uuid,
        item_count: usize,
        rejected_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// An item changed state or metadata
    ItemUpdated {
        batch_id: Uuid,
        item_id: Uuid,
        index: usize,
        status: ItemStatus,
        title: String,
        has_preview: bool,
        timestamp: DateTime<Utc>,
    },

    /// An item was removed before upload
    ItemRemoved {
        batch_id: Uuid,
        item_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Upload run passed the ready gate
    UploadStarted {
        batch_id: Uuid,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// One item finished uploading (success or failure)
    UploadProgress {
        batch_id: Uuid,
        completed: usize,
        total: usize,
        outcome: ItemOutcome,
        timestamp: DateTime<Utc>,
    },

    /// Upload run finished
    UploadCompleted {
        batch_id: Uuid,
        succeeded: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },

    /// Batch cleared and all owned assets released
    BatchCleared {
        batch_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl BatchEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            BatchEvent::BatchCreated { .. } => "BatchCreated",
            BatchEvent::ItemUpdated { .. } => "ItemUpdated",
            BatchEvent::ItemRemoved { .. } => "ItemRemoved",
            BatchEvent::UploadStarted { .. } => "UploadStarted",
            BatchEvent::UploadProgress { .. } => "UploadProgress",
            BatchEvent::UploadCompleted { .. } => "UploadCompleted",
            BatchEvent::BatchCleared { .. } => "BatchCleared",
        }
    }

    pub fn batch_id(&self) -> Uuid {
        match self {
            BatchEvent::BatchCreated { batch_id, .. }
            | BatchEvent::ItemUpdated { batch_id, .. }
            | BatchEvent::ItemRemoved { batch_id, .. }
            | BatchEvent::UploadStarted { batch_id, .. }
            | BatchEvent::UploadProgress { batch_id, .. }
            | BatchEvent::UploadCompleted { batch_id, .. }
            | BatchEvent::BatchCleared { batch_id, .. } => *batch_id,
        }
    }
}

/// Broadcast bus for batch events
///
/// Cheap to clone; all clones share one channel. Sending never blocks and
/// never fails the caller when nobody is listening.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BatchEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lag and lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, returning the number of receivers
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: BatchEvent) -> Result<usize, broadcast::error::SendError<BatchEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: BatchEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
