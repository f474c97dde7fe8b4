//! Upload run results

use mbp_common::events::ItemOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One failed item in the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub index: usize,
    pub title: String,
    pub error: String,
}

/// Counts derived from the outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<FailureDetail>,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.total > 0 && self.failed == 0
    }

    /// Some but not all items were created
    pub fn is_partial(&self) -> bool {
        self.succeeded > 0 && self.failed > 0
    }
}

/// Produced once per upload run; outcomes in original item order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub outcomes: Vec<ItemOutcome>,
    pub summary: BatchSummary,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}
