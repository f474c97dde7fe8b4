//! Batch value objects

use crate::models::pending_item::ItemView;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a batch holds links or files; a batch never mixes the two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    Links,
    Files,
}

/// Grouping identifiers applied to every item at submission time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDefaults {
    #[serde(default)]
    pub folder_ids: Vec<String>,
    #[serde(default)]
    pub collection_ids: Vec<String>,
    #[serde(default)]
    pub course_ids: Vec<String>,
}

impl BatchDefaults {
    pub fn is_empty(&self) -> bool {
        self.folder_ids.is_empty() && self.collection_ids.is_empty() && self.course_ids.is_empty()
    }
}

/// Point-in-time view of a batch
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub batch_id: Uuid,
    pub kind: BatchKind,
    pub defaults: BatchDefaults,
    pub items: Vec<ItemView>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
