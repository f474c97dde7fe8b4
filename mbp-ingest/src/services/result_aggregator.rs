//! Batch result aggregation

use crate::models::{BatchResult, BatchSummary, FailureDetail, ItemOutcome};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Reduce outcomes to counts and the failure list
pub fn summarize(outcomes: &[ItemOutcome]) -> BatchSummary {
    let failures: Vec<FailureDetail> = outcomes
        .iter()
        .filter(|o| !o.success)
        .map(|o| FailureDetail {
            index: o.index,
            title: o.title.clone(),
            error: o.error.clone().unwrap_or_else(|| "Unknown error".to_string()),
        })
        .collect();

    BatchSummary {
        total: outcomes.len(),
        succeeded: outcomes.len() - failures.len(),
        failed: failures.len(),
        failures,
    }
}

/// Assemble the final result of an upload run
pub fn aggregate(
    batch_id: Uuid,
    outcomes: Vec<ItemOutcome>,
    started_at: DateTime<Utc>,
) -> BatchResult {
    let summary = summarize(&outcomes);
    BatchResult {
        batch_id,
        outcomes,
        summary,
        started_at,
        finished_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_and_failures() {
        let outcomes = vec![
            ItemOutcome::succeeded(0, Uuid::new_v4(), "a".into(), "m-1".into()),
            ItemOutcome::failed(1, Uuid::new_v4(), "b".into(), "Title taken".into()),
            ItemOutcome::succeeded(2, Uuid::new_v4(), "c".into(), "m-3".into()),
        ];
        let summary = summarize(&outcomes);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(summary.is_partial());
        assert!(!summary.all_succeeded());
        assert_eq!(
            summary.failures,
            vec![FailureDetail {
                index: 1,
                title: "b".into(),
                error: "Title taken".into()
            }]
        );
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary, BatchSummary::default());
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn test_aggregate_keeps_order() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let outcomes = ids
            .iter()
            .enumerate()
            .map(|(i, id)| ItemOutcome::succeeded(i, *id, format!("t{}", i), format!("m{}", i)))
            .collect();
        let result = aggregate(Uuid::nil(), outcomes, Utc::now());

        let order: Vec<Uuid> = result.outcomes.iter().map(|o| o.item_id).collect();
        assert_eq!(order, ids);
        assert!(result.summary.all_succeeded());
        assert!(result.finished_at >= result.started_at);
    }
}
