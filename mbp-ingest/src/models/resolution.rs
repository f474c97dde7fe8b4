//! Resolver input and output

use crate::models::pending_item::ItemSource;
use crate::models::preview::Preview;
use uuid::Uuid;

/// Snapshot handed to a resolver task
///
/// `generation` is captured when resolution starts; the ledger only applies
/// the result if the item's generation still matches.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub item_id: Uuid,
    pub generation: u64,
    pub source: ItemSource,
    pub fallback_title: String,
    pub needs_title: bool,
    pub needs_preview: bool,
}

/// Best-available metadata for one item
///
/// Every field is optional; an all-empty resolution is a valid outcome.
#[derive(Debug, Default)]
pub struct Resolution {
    pub title: Option<String>,
    pub preview: Option<Preview>,
    pub page_count: Option<u32>,
}

impl Resolution {
    pub fn with_preview(preview: Preview) -> Self {
        Self {
            preview: Some(preview),
            ..Self::default()
        }
    }

    /// Release an unused result (e.g. stale after an edit)
    pub fn discard(self) {
        if let Some(preview) = self.preview {
            preview.release();
        }
    }
}
