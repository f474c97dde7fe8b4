//! Service modules for the batch ingestion pipeline
//!
//! Leaf-first: `source_normalizer` → `batch_parser` → `item_ledger` →
//! `resolvers` → `upload_executor` → `result_aggregator`.

pub mod batch_parser;
pub mod creation_client;
pub mod item_ledger;
pub mod progress;
pub mod resolvers;
pub mod result_aggregator;
pub mod source_normalizer;
pub mod upload_executor;

pub use batch_parser::{BatchParser, Delimiter, ParseOutcome, RejectReason, RejectedInput};
pub use creation_client::{
    CreationClient, CreationError, CreationRequest, HttpCreationClient, Locator, PreviewRef,
};
pub use item_ledger::{ItemLedger, ResolutionTicket};
pub use progress::{ChannelObserver, EventBusObserver, NoopObserver, ProgressObserver, ProgressUpdate};
pub use resolvers::{MetadataResolver, ResolveError, ResolverConfig, SourceResolver};
pub use upload_executor::{PreparedUpload, UploadExecutor};
