//! Item ledger
//!
//! In-memory store of the items of one batch, addressed by item id and kept in
//! insertion order. Every transition runs under the ledger's write lock and is
//! delegated to the reducer methods on `PendingItem`.
//!
//! Each entry carries a cancellation token for its in-flight resolution. Edits
//! and removals cancel the token and bump the item generation, so a resolver
//! that finishes late has its result discarded (and any blob it produced
//! released) instead of overwriting newer state.

use crate::error::{IngestError, IngestResult};
use crate::models::{ItemOutcome, ItemStatus, ItemView, PendingItem, ResolveRequest, Resolution};
use crate::services::source_normalizer::{
    classify_url, normalize_url, parse_http_url, title_from_url,
};
use chrono::Utc;
use mbp_common::events::{BatchEvent, EventBus};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct LedgerEntry {
    item: PendingItem,
    cancel: CancellationToken,
}

impl LedgerEntry {
    /// Cancel in-flight work and arm a fresh token for the next resolution
    fn reset_token(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
    }
}

struct LedgerState {
    entries: Vec<LedgerEntry>,
    /// Next ordinal; never reused within a batch
    next_index: usize,
    upload_running: bool,
}

impl LedgerState {
    fn entry_mut(&mut self, item_id: Uuid) -> IngestResult<&mut LedgerEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.item.id == item_id)
            .ok_or(IngestError::ItemNotFound(item_id))
    }

    fn ensure_unlocked(&self) -> IngestResult<()> {
        if self.upload_running {
            Err(IngestError::UploadInProgress)
        } else {
            Ok(())
        }
    }
}

/// Work handed to a resolver task
#[derive(Debug, Clone)]
pub struct ResolutionTicket {
    pub request: ResolveRequest,
    pub cancel: CancellationToken,
}

/// Shared per-batch item store
#[derive(Clone)]
pub struct ItemLedger {
    batch_id: Uuid,
    max_items: usize,
    state: Arc<RwLock<LedgerState>>,
    changed: Arc<Notify>,
    events: Option<EventBus>,
}

impl ItemLedger {
    pub fn new(batch_id: Uuid, max_items: usize) -> Self {
        Self {
            batch_id,
            max_items,
            state: Arc::new(RwLock::new(LedgerState {
                entries: Vec::new(),
                next_index: 0,
                upload_running: false,
            })),
            changed: Arc::new(Notify::new()),
            events: None,
        }
    }

    /// Publish item changes on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    pub async fn is_upload_running(&self) -> bool {
        self.state.read().await.upload_running
    }

    /// Append parsed items, assigning ordinals
    pub async fn insert_all(&self, items: Vec<PendingItem>) -> IngestResult<Vec<Uuid>> {
        let mut state = self.state.write().await;
        state.ensure_unlocked()?;

        let attempted = state.entries.len() + items.len();
        if attempted > self.max_items {
            return Err(IngestError::CapacityExceeded {
                attempted,
                limit: self.max_items,
            });
        }

        let mut ids = Vec::with_capacity(items.len());
        for mut item in items {
            item.index = state.next_index;
            state.next_index += 1;
            ids.push(item.id);
            self.publish_item(&item);
            state.entries.push(LedgerEntry {
                item,
                cancel: CancellationToken::new(),
            });
        }

        tracing::debug!(batch_id = %self.batch_id, added = ids.len(), total = state.entries.len(), "Items added to ledger");
        Ok(ids)
    }

    /// Move every `Pending` item forward, returning the work to spawn
    ///
    /// Items that need nothing resolved go straight to `Ready`.
    pub async fn begin_pending(&self) -> Vec<ResolutionTicket> {
        let mut state = self.state.write().await;
        let mut tickets = Vec::new();

        for entry in state
            .entries
            .iter_mut()
            .filter(|e| e.item.status == ItemStatus::Pending)
        {
            match entry.item.begin_resolution() {
                Ok(Some(request)) => tickets.push(ResolutionTicket {
                    request,
                    cancel: entry.cancel.clone(),
                }),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(item_id = %entry.item.id, error = %e, "Cannot start resolution");
                    continue;
                }
            }
            self.publish_item(&entry.item);
        }
        drop(state);

        self.changed.notify_waiters();
        tickets
    }

    /// Apply a resolver result; returns `false` when it was stale and discarded
    pub async fn apply_resolution(
        &self,
        item_id: Uuid,
        generation: u64,
        resolution: Resolution,
    ) -> bool {
        let mut state = self.state.write().await;
        let Ok(entry) = state.entry_mut(item_id) else {
            tracing::debug!(item_id = %item_id, "Resolution for removed item discarded");
            resolution.discard();
            return false;
        };

        let applied = match entry.item.apply_resolution(generation, resolution) {
            Ok(()) => {
                tracing::debug!(
                    item_id = %item_id,
                    title = %entry.item.title,
                    has_preview = entry.item.preview.is_some(),
                    "Item resolved"
                );
                self.publish_item(&entry.item);
                true
            }
            Err(stale) => {
                tracing::debug!(
                    item_id = %item_id,
                    generation,
                    current = entry.item.generation,
                    "Stale resolution discarded"
                );
                stale.discard();
                false
            }
        };
        drop(state);

        self.changed.notify_waiters();
        applied
    }

    /// Set a user title
    pub async fn rename(&self, item_id: Uuid, title: &str) -> IngestResult<ItemView> {
        let mut state = self.state.write().await;
        state.ensure_unlocked()?;
        let entry = state.entry_mut(item_id)?;
        entry.item.rename(title)?;
        self.publish_item(&entry.item);
        let view = entry.item.view();
        drop(state);

        self.changed.notify_waiters();
        Ok(view)
    }

    /// Replace a link item's URL; the item returns to `Pending`
    pub async fn edit_link(&self, item_id: Uuid, raw_url: &str) -> IngestResult<ItemView> {
        let url = normalize_url(raw_url);
        if parse_http_url(&url).is_none() {
            return Err(IngestError::InvalidUrl(raw_url.trim().to_string()));
        }
        let detected_type = classify_url(&url);
        let fallback_title = title_from_url(&url);

        let mut state = self.state.write().await;
        state.ensure_unlocked()?;
        let entry = state.entry_mut(item_id)?;
        entry.item.edit_link(url, detected_type, fallback_title)?;
        entry.reset_token();
        tracing::debug!(item_id = %item_id, detected_type = detected_type.label(), "Link edited");
        self.publish_item(&entry.item);
        let view = entry.item.view();
        drop(state);

        self.changed.notify_waiters();
        Ok(view)
    }

    /// Remove an item before upload, cancelling its resolution
    pub async fn remove(&self, item_id: Uuid) -> IngestResult<()> {
        let mut state = self.state.write().await;
        state.ensure_unlocked()?;

        let position = state
            .entries
            .iter()
            .position(|e| e.item.id == item_id)
            .ok_or(IngestError::ItemNotFound(item_id))?;
        let status = state.entries[position].item.status;
        if !status.is_editable() {
            return Err(IngestError::InvalidTransition {
                item_id,
                from: status,
                to: "removed",
            });
        }

        let mut entry = state.entries.remove(position);
        entry.cancel.cancel();
        entry.item.invalidate();
        entry.item.release_owned_assets();
        drop(state);

        tracing::debug!(batch_id = %self.batch_id, item_id = %item_id, "Item removed");
        self.emit(BatchEvent::ItemRemoved {
            batch_id: self.batch_id,
            item_id,
            timestamp: Utc::now(),
        });
        self.changed.notify_waiters();
        Ok(())
    }

    /// Drop every item, cancelling resolutions and releasing owned previews
    ///
    /// Publishes `ItemRemoved` for each dropped item.
    pub async fn clear(&self) -> IngestResult<usize> {
        let mut state = self.state.write().await;
        state.ensure_unlocked()?;

        let entries = std::mem::take(&mut state.entries);
        drop(state);

        let count = entries.len();
        for mut entry in entries {
            entry.cancel.cancel();
            entry.item.invalidate();
            entry.item.release_owned_assets();
            self.emit(BatchEvent::ItemRemoved {
                batch_id: self.batch_id,
                item_id: entry.item.id,
                timestamp: Utc::now(),
            });
        }

        tracing::debug!(batch_id = %self.batch_id, released = count, "Ledger cleared");
        self.changed.notify_waiters();
        Ok(count)
    }

    pub async fn snapshot(&self) -> Vec<ItemView> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .map(|e| e.item.view())
            .collect()
    }

    pub async fn get(&self, item_id: Uuid) -> IngestResult<ItemView> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .find(|e| e.item.id == item_id)
            .map(|e| e.item.view())
            .ok_or(IngestError::ItemNotFound(item_id))
    }

    /// Whether no item is still waiting on a resolver
    pub async fn is_settled(&self) -> bool {
        self.state.read().await.entries.iter().all(|e| {
            !matches!(e.item.status, ItemStatus::Pending | ItemStatus::Resolving)
        })
    }

    /// Wait until every item has left `Pending`/`Resolving`
    pub async fn wait_settled(&self) {
        loop {
            let notified = self.changed.notified();
            if self.is_settled().await {
                return;
            }
            notified.await;
        }
    }

    /// Ready gate: check preconditions and lock the ledger for upload
    ///
    /// Returns the item ids in upload order. Nothing changes on failure.
    pub async fn prepare_upload(&self) -> IngestResult<Vec<Uuid>> {
        let mut state = self.state.write().await;
        state.ensure_unlocked()?;

        if state.entries.is_empty() {
            return Err(IngestError::Precondition("batch has no items".to_string()));
        }
        if state.entries.len() > self.max_items {
            return Err(IngestError::Precondition(format!(
                "batch has {} items, limit is {}",
                state.entries.len(),
                self.max_items
            )));
        }
        if let Some(entry) = state
            .entries
            .iter()
            .find(|e| e.item.status != ItemStatus::Ready)
        {
            return Err(IngestError::Precondition(format!(
                "item {} is {:?}, not ready",
                entry.item.index, entry.item.status
            )));
        }
        if let Some(entry) = state.entries.iter().find(|e| !e.item.has_valid_title()) {
            return Err(IngestError::Precondition(format!(
                "item {} has no valid title",
                entry.item.index
            )));
        }

        state.upload_running = true;
        let ids = state.entries.iter().map(|e| e.item.id).collect();
        tracing::info!(batch_id = %self.batch_id, items = state.entries.len(), "Ready gate passed");
        Ok(ids)
    }

    /// `Ready → Uploading`, returning the snapshot to submit
    pub async fn mark_uploading(&self, item_id: Uuid) -> IngestResult<ItemView> {
        let mut state = self.state.write().await;
        let entry = state.entry_mut(item_id)?;
        entry.item.mark_uploading()?;
        self.publish_item(&entry.item);
        Ok(entry.item.view())
    }

    /// Record the creation outcome and release the item's owned preview
    pub async fn complete(
        &self,
        item_id: Uuid,
        result: Result<String, String>,
    ) -> IngestResult<ItemOutcome> {
        let mut state = self.state.write().await;
        let entry = state.entry_mut(item_id)?;
        let item = &mut entry.item;

        let outcome = match result {
            Ok(result_id) => {
                item.mark_succeeded(result_id.clone())?;
                ItemOutcome::succeeded(item.index, item.id, item.title.clone(), result_id)
            }
            Err(error) => {
                item.mark_failed(error.clone())?;
                ItemOutcome::failed(item.index, item.id, item.title.clone(), error)
            }
        };
        self.publish_item(item);
        Ok(outcome)
    }

    /// Release the upload lock
    pub async fn finish_upload(&self) {
        self.state.write().await.upload_running = false;
        self.changed.notify_waiters();
    }

    fn publish_item(&self, item: &PendingItem) {
        self.emit(BatchEvent::ItemUpdated {
            batch_id: self.batch_id,
            item_id: item.id,
            index: item.index,
            status: item.status,
            title: item.title.clone(),
            has_preview: item.preview.is_some(),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(bus) = &self.events {
            bus.emit_lossy(event);
        }
    }
}
