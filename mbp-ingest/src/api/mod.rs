//! HTTP API handlers for mbp-ingest
//!
//! REST endpoints for batch management plus a per-batch SSE stream.

pub mod batches;
pub mod health;
pub mod sse;

pub use batches::batch_routes;
pub use health::health_routes;
pub use sse::batch_event_stream;
