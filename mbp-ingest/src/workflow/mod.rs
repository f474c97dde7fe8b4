//! Batch workflow
//!
//! Wires the pipeline services together for one batch at a time:
//! parse → ledger → concurrent resolution → ready gate → sequential upload →
//! aggregated result.

pub mod batch_session;
pub mod registry;

pub use batch_session::{BatchPhase, BatchSession, BatchSnapshot};
pub use registry::SessionRegistry;

use crate::services::{BatchParser, MetadataResolver, UploadExecutor};
use mbp_common::events::EventBus;
use std::sync::Arc;

/// Services shared by every batch session
#[derive(Clone)]
pub struct Pipeline {
    pub parser: BatchParser,
    pub resolver: Arc<MetadataResolver>,
    pub executor: Arc<UploadExecutor>,
    pub events: EventBus,
}

impl Pipeline {
    pub fn new(
        parser: BatchParser,
        resolver: Arc<MetadataResolver>,
        executor: Arc<UploadExecutor>,
        events: EventBus,
    ) -> Self {
        Self {
            parser,
            resolver,
            executor,
            events,
        }
    }
}
