//! One live batch: its ledger, defaults and the result of its upload run

use super::Pipeline;
use crate::error::{IngestError, IngestResult};
use crate::models::{Batch, BatchDefaults, BatchKind, BatchResult, ItemView, LOADING_TITLE};
use crate::services::{EventBusObserver, ItemLedger, ParseOutcome, PreparedUpload, RejectedInput};
use chrono::{DateTime, Utc};
use mbp_common::events::BatchEvent;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Where the batch is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    /// Items may be added, edited and removed
    Editing,
    /// Upload run in progress; the batch is locked
    Uploading,
    /// Upload run finished; the result is available
    Completed,
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct BatchSnapshot {
    #[serde(flatten)]
    pub batch: Batch,
    pub phase: BatchPhase,
    pub created_at: DateTime<Utc>,
    /// Inputs rejected by the most recent parse
    pub rejected: Vec<RejectedInput>,
}

pub struct BatchSession {
    batch_id: Uuid,
    kind: BatchKind,
    created_at: DateTime<Utc>,
    ledger: ItemLedger,
    pipeline: Pipeline,
    defaults: RwLock<BatchDefaults>,
    rejected: RwLock<Vec<RejectedInput>>,
    result: RwLock<Option<BatchResult>>,
}

impl BatchSession {
    fn new(pipeline: &Pipeline, kind: BatchKind, defaults: BatchDefaults) -> Self {
        let batch_id = Uuid::new_v4();
        let limits = pipeline.parser.limits();
        let max_items = match kind {
            BatchKind::Links => limits.max_links,
            BatchKind::Files => limits.max_files,
        };

        Self {
            batch_id,
            kind,
            created_at: Utc::now(),
            ledger: ItemLedger::new(batch_id, max_items).with_events(pipeline.events.clone()),
            pipeline: pipeline.clone(),
            defaults: RwLock::new(defaults),
            rejected: RwLock::new(Vec::new()),
            result: RwLock::new(None),
        }
    }

    /// Parse a link list into a new batch and start resolving it
    pub async fn create_links(
        pipeline: &Pipeline,
        text: &str,
        defaults: BatchDefaults,
    ) -> IngestResult<Arc<Self>> {
        let session = Arc::new(Self::new(pipeline, BatchKind::Links, defaults));
        let outcome = pipeline.parser.parse_links(text, 0);
        session.admit(outcome).await?;
        session.announce().await;
        Ok(session)
    }

    /// Build a new file batch from local paths and start resolving it
    pub async fn create_files(
        pipeline: &Pipeline,
        paths: &[PathBuf],
        defaults: BatchDefaults,
    ) -> IngestResult<Arc<Self>> {
        let session = Arc::new(Self::new(pipeline, BatchKind::Files, defaults));
        let outcome = pipeline.parser.parse_files(paths, 0);
        session.admit(outcome).await?;
        session.announce().await;
        Ok(session)
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    pub fn ledger(&self) -> &ItemLedger {
        &self.ledger
    }

    /// Replace the whole link text; in-flight resolutions are discarded
    pub async fn replace_links(&self, text: &str) -> IngestResult<Vec<RejectedInput>> {
        self.require_kind(BatchKind::Links)?;
        let released = self.ledger.clear().await?;
        tracing::info!(batch_id = %self.batch_id, released, "Link text replaced");

        let outcome = self.pipeline.parser.parse_links(text, 0);
        self.admit(outcome).await
    }

    /// Add more files, counting the ones already in the batch against the cap
    pub async fn add_files(&self, paths: &[PathBuf]) -> IngestResult<Vec<RejectedInput>> {
        self.require_kind(BatchKind::Files)?;
        if self.ledger.is_upload_running().await {
            return Err(IngestError::UploadInProgress);
        }

        let already = self.ledger.len().await;
        let outcome = self.pipeline.parser.parse_files(paths, already);
        self.admit(outcome).await
    }

    /// Apply a URL and/or title edit; the title is applied last so it wins
    pub async fn update_item(
        &self,
        item_id: Uuid,
        title: Option<&str>,
        url: Option<&str>,
    ) -> IngestResult<ItemView> {
        if let Some(title) = title.map(str::trim) {
            if title.is_empty() || title == LOADING_TITLE {
                return Err(IngestError::InvalidTitle(format!("{:?}", title)));
            }
        }

        let mut view = self.ledger.get(item_id).await?;
        if let Some(url) = url {
            view = self.ledger.edit_link(item_id, url).await?;
        }
        if let Some(title) = title {
            view = self.ledger.rename(item_id, title).await?;
        }
        if url.is_some() {
            self.start_resolution().await;
            view = self.ledger.get(item_id).await?;
        }
        Ok(view)
    }

    pub async fn remove_item(&self, item_id: Uuid) -> IngestResult<()> {
        self.ledger.remove(item_id).await
    }

    pub async fn set_defaults(&self, defaults: BatchDefaults) -> IngestResult<()> {
        if self.ledger.is_upload_running().await {
            return Err(IngestError::UploadInProgress);
        }
        *self.defaults.write().await = defaults;
        Ok(())
    }

    pub async fn defaults(&self) -> BatchDefaults {
        self.defaults.read().await.clone()
    }

    pub async fn phase(&self) -> BatchPhase {
        if self.ledger.is_upload_running().await {
            BatchPhase::Uploading
        } else if self.result.read().await.is_some() {
            BatchPhase::Completed
        } else {
            BatchPhase::Editing
        }
    }

    pub async fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            batch: Batch {
                batch_id: self.batch_id,
                kind: self.kind,
                defaults: self.defaults().await,
                items: self.ledger.snapshot().await,
            },
            phase: self.phase().await,
            created_at: self.created_at,
            rejected: self.rejected.read().await.clone(),
        }
    }

    /// Wait for every item to leave resolution; `false` on timeout
    pub async fn wait_for_resolution(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.ledger.wait_settled())
            .await
            .is_ok()
    }

    /// Ready gate, then drain in the background
    ///
    /// Returns the number of items submitted. Violations are reported here,
    /// before any request is made.
    pub async fn start_upload(self: &Arc<Self>) -> IngestResult<usize> {
        let prepared = self.prepare().await?;
        let total = prepared.total();

        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.execute(prepared).await;
        });

        Ok(total)
    }

    /// Ready gate and drain in the foreground
    pub async fn upload(&self) -> IngestResult<BatchResult> {
        let prepared = self.prepare().await?;
        Ok(self.execute(prepared).await)
    }

    pub async fn result(&self) -> Option<BatchResult> {
        self.result.read().await.clone()
    }

    /// Drop all items and release their owned previews
    pub async fn clear(&self) -> IngestResult<usize> {
        let released = self.ledger.clear().await?;
        self.rejected.write().await.clear();
        self.pipeline.events.emit_lossy(BatchEvent::BatchCleared {
            batch_id: self.batch_id,
            timestamp: Utc::now(),
        });
        tracing::info!(batch_id = %self.batch_id, released, "Batch cleared");
        Ok(released)
    }

    async fn prepare(&self) -> IngestResult<PreparedUpload> {
        let defaults = self.defaults().await;
        let prepared = self.pipeline.executor.prepare(&self.ledger, defaults).await?;
        *self.result.write().await = None;

        self.pipeline.events.emit_lossy(BatchEvent::UploadStarted {
            batch_id: self.batch_id,
            total: prepared.total(),
            timestamp: Utc::now(),
        });
        Ok(prepared)
    }

    async fn execute(&self, prepared: PreparedUpload) -> BatchResult {
        let observer = EventBusObserver::new(self.batch_id, self.pipeline.events.clone());
        let result = self
            .pipeline
            .executor
            .drain(&self.ledger, prepared, &observer)
            .await;

        // Result before unlock, unlock before announcing completion
        *self.result.write().await = Some(result.clone());
        self.ledger.finish_upload().await;

        self.pipeline.events.emit_lossy(BatchEvent::UploadCompleted {
            batch_id: self.batch_id,
            succeeded: result.summary.succeeded,
            failed: result.summary.failed,
            timestamp: Utc::now(),
        });
        result
    }

    /// Insert parsed items, record rejections and start resolving
    async fn admit(&self, outcome: ParseOutcome) -> IngestResult<Vec<RejectedInput>> {
        let ParseOutcome { items, rejected } = outcome;
        self.ledger.insert_all(items).await?;
        *self.rejected.write().await = rejected.clone();
        self.start_resolution().await;
        Ok(rejected)
    }

    async fn start_resolution(&self) {
        let tickets = self.ledger.begin_pending().await;
        if !tickets.is_empty() {
            tracing::debug!(batch_id = %self.batch_id, count = tickets.len(), "Spawning resolvers");
            self.pipeline.resolver.spawn_all(&self.ledger, tickets);
        }
    }

    async fn announce(&self) {
        let item_count = self.ledger.len().await;
        let rejected_count = self.rejected.read().await.len();
        tracing::info!(
            batch_id = %self.batch_id,
            kind = ?self.kind,
            items = item_count,
            rejected = rejected_count,
            "Batch created"
        );
        self.pipeline.events.emit_lossy(BatchEvent::BatchCreated {
            batch_id: self.batch_id,
            item_count,
            rejected_count,
            timestamp: Utc::now(),
        });
    }

    fn require_kind(&self, kind: BatchKind) -> IngestResult<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(IngestError::WrongSourceKind(format!(
                "batch holds {:?}, not {:?}",
                self.kind, kind
            )))
        }
    }
}
