//! Batch pipeline type definitions
//!
//! Supporting types shared between the ingest pipeline and event consumers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-item lifecycle state
///
/// `Pending → Resolving → Ready → Uploading → Success | Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Just parsed, resolution not started
    Pending,
    /// Metadata resolution in flight
    Resolving,
    /// Eligible for upload
    Ready,
    /// Creation request in flight
    Uploading,
    /// Created; result id recorded
    Success,
    /// Creation failed; error recorded
    Error,
}

impl ItemStatus {
    /// Terminal states accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Success | ItemStatus::Error)
    }

    /// States in which the user may still edit or remove the item
    pub fn is_editable(self) -> bool {
        matches!(
            self,
            ItemStatus::Pending | ItemStatus::Resolving | ItemStatus::Ready
        )
    }
}

/// Outcome of one creation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Ordinal assigned when the item entered the batch
    pub index: usize,
    pub item_id: Uuid,
    pub title: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn succeeded(index: usize, item_id: Uuid, title: String, result_id: String) -> Self {
        Self {
            index,
            item_id,
            title,
            success: true,
            result_id: Some(result_id),
            error: None,
        }
    }

    pub fn failed(index: usize, item_id: Uuid, title: String, error: String) -> Self {
        Self {
            index,
            item_id,
            title,
            success: false,
            result_id: None,
            error: Some(error),
        }
    }
}
