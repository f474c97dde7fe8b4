//! Data models for the batch ingestion pipeline

pub mod batch;
pub mod batch_result;
pub mod pending_item;
pub mod preview;
pub mod resolution;

pub use batch::{Batch, BatchDefaults, BatchKind};
pub use batch_result::{BatchResult, BatchSummary, FailureDetail};
pub use mbp_common::events::{ItemOutcome, ItemStatus};
pub use pending_item::{DetectedType, FileHandle, ItemSource, ItemView, PendingItem, LOADING_TITLE};
pub use preview::{Preview, PreviewView, ThumbnailBlob};
pub use resolution::{ResolveRequest, Resolution};
