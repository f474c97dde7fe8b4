//! Upload executor
//!
//! Drains a prepared batch through the creation operation one item at a time.
//! A failed item is recorded and the run moves on; the run itself only fails
//! at the ready gate, before anything is submitted.

use crate::error::IngestResult;
use crate::models::{BatchDefaults, BatchResult, ItemOutcome};
use crate::services::creation_client::{CreationClient, CreationRequest};
use crate::services::item_ledger::ItemLedger;
use crate::services::progress::ProgressObserver;
use crate::services::result_aggregator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// A batch that passed the ready gate; the ledger stays locked until executed
#[derive(Debug)]
pub struct PreparedUpload {
    item_ids: Vec<Uuid>,
    defaults: BatchDefaults,
    started_at: DateTime<Utc>,
}

impl PreparedUpload {
    pub fn total(&self) -> usize {
        self.item_ids.len()
    }

    pub fn item_ids(&self) -> &[Uuid] {
        &self.item_ids
    }
}

pub struct UploadExecutor {
    client: Arc<dyn CreationClient>,
}

impl UploadExecutor {
    pub fn new(client: Arc<dyn CreationClient>) -> Self {
        Self { client }
    }

    /// Check preconditions and lock the ledger
    pub async fn prepare(
        &self,
        ledger: &ItemLedger,
        defaults: BatchDefaults,
    ) -> IngestResult<PreparedUpload> {
        let item_ids = ledger.prepare_upload().await?;
        Ok(PreparedUpload {
            item_ids,
            defaults,
            started_at: Utc::now(),
        })
    }

    /// Submit every prepared item in order and release the ledger lock
    pub async fn execute(
        &self,
        ledger: &ItemLedger,
        prepared: PreparedUpload,
        observer: &dyn ProgressObserver,
    ) -> BatchResult {
        let result = self.drain(ledger, prepared, observer).await;
        ledger.finish_upload().await;
        result
    }

    /// Submit every prepared item in order; the ledger stays locked
    ///
    /// The caller releases the lock with `ItemLedger::finish_upload` once the
    /// result is stored where readers will look for it.
    pub async fn drain(
        &self,
        ledger: &ItemLedger,
        prepared: PreparedUpload,
        observer: &dyn ProgressObserver,
    ) -> BatchResult {
        let batch_id = ledger.batch_id();
        let total = prepared.total();
        let mut outcomes: Vec<ItemOutcome> = Vec::with_capacity(total);

        tracing::info!(batch_id = %batch_id, total, "Upload started");

        for item_id in &prepared.item_ids {
            let view = match ledger.mark_uploading(*item_id).await {
                Ok(view) => view,
                Err(e) => {
                    tracing::error!(batch_id = %batch_id, item_id = %item_id, error = %e, "Item could not enter upload");
                    continue;
                }
            };

            let request = CreationRequest::from_view(&view, &prepared.defaults);
            let result = self
                .client
                .create(&request)
                .await
                .map_err(|e| e.to_string());

            if let Err(error) = &result {
                tracing::warn!(batch_id = %batch_id, index = view.index, title = %view.title, error = %error, "Item upload failed");
            } else {
                tracing::debug!(batch_id = %batch_id, index = view.index, "Item uploaded");
            }

            match ledger.complete(*item_id, result).await {
                Ok(outcome) => {
                    observer.on_progress(outcomes.len() + 1, total, &outcome);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    tracing::error!(batch_id = %batch_id, item_id = %item_id, error = %e, "Cannot record upload outcome");
                }
            }
        }

        let result = result_aggregator::aggregate(batch_id, outcomes, prepared.started_at);
        tracing::info!(
            batch_id = %batch_id,
            succeeded = result.summary.succeeded,
            failed = result.summary.failed,
            "Upload finished"
        );
        result
    }

    /// `prepare` then `execute`
    pub async fn run(
        &self,
        ledger: &ItemLedger,
        defaults: BatchDefaults,
        observer: &dyn ProgressObserver,
    ) -> IngestResult<BatchResult> {
        let prepared = self.prepare(ledger, defaults).await?;
        Ok(self.execute(ledger, prepared, observer).await)
    }
}
