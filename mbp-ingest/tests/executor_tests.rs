//! Upload executor integration tests
//!
//! Sequential drain with per-item failure isolation, driven through a
//! scripted creation client.

mod helpers;

use helpers::ScriptedClient;
use mbp_ingest::models::{BatchDefaults, DetectedType, ItemStatus, PendingItem};
use mbp_ingest::services::{ChannelObserver, ItemLedger, NoopObserver, UploadExecutor};
use mbp_ingest::IngestError;
use std::sync::Arc;
use uuid::Uuid;

fn titled_link(title: &str) -> PendingItem {
    let url = format!("https://example.org/{}", title.to_lowercase());
    PendingItem::from_link(
        Some(title.to_string()),
        url,
        DetectedType::GenericLink,
        title.to_string(),
    )
}

/// Ledger whose items are all `Ready` (titled generic links need no resolution)
async fn ready_ledger(titles: &[&str]) -> (ItemLedger, Vec<Uuid>) {
    let ledger = ItemLedger::new(Uuid::new_v4(), 50);
    let ids = ledger
        .insert_all(titles.iter().map(|t| titled_link(t)).collect())
        .await
        .unwrap();
    assert!(ledger.begin_pending().await.is_empty());
    (ledger, ids)
}

#[tokio::test]
async fn test_failure_in_the_middle_does_not_stop_the_run() {
    let (ledger, ids) = ready_ledger(&["One", "Two", "Three"]).await;
    let client = ScriptedClient::new(vec![Ok("m-1"), Err("Quota exceeded"), Ok("m-3")]);
    let executor = UploadExecutor::new(client.clone());
    let (observer, mut progress) = ChannelObserver::new();

    let result = executor
        .run(&ledger, BatchDefaults::default(), &observer)
        .await
        .unwrap();

    assert_eq!(client.call_count(), 3);
    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(
        result.outcomes.iter().map(|o| o.success).collect::<Vec<_>>(),
        vec![true, false, true]
    );
    assert_eq!(result.outcomes[2].result_id.as_deref(), Some("m-3"));

    assert_eq!(result.summary.total, 3);
    assert_eq!(result.summary.succeeded, 2);
    assert_eq!(result.summary.failed, 1);
    assert!(result.summary.is_partial());
    assert_eq!(result.summary.failures[0].index, 1);
    assert_eq!(result.summary.failures[0].title, "Two");
    assert!(result.summary.failures[0].error.contains("Quota exceeded"));

    let failed = ledger.get(ids[1]).await.unwrap();
    assert_eq!(failed.status, ItemStatus::Error);
    assert!(failed.error.unwrap().contains("Quota exceeded"));
    assert_eq!(ledger.get(ids[2]).await.unwrap().status, ItemStatus::Success);

    let mut updates = Vec::new();
    while let Ok(update) = progress.try_recv() {
        updates.push((update.completed, update.total, update.outcome.index));
    }
    assert_eq!(updates, vec![(1, 3, 0), (2, 3, 1), (3, 3, 2)]);
}

#[tokio::test]
async fn test_outcomes_follow_item_order() {
    let titles = ["A", "B", "C", "D", "E"];
    let (ledger, ids) = ready_ledger(&titles).await;
    let client = ScriptedClient::always_ok();

    let result = UploadExecutor::new(client.clone())
        .run(&ledger, BatchDefaults::default(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(client.submitted_indices(), vec![0, 1, 2, 3, 4]);
    assert_eq!(
        result.outcomes.iter().map(|o| o.item_id).collect::<Vec<_>>(),
        ids
    );
    assert!(result.summary.all_succeeded());
    assert!(!ledger.is_upload_running().await);
}

#[tokio::test]
async fn test_removed_item_is_not_submitted_or_reported() {
    let ledger = ItemLedger::new(Uuid::new_v4(), 50);
    let ids = ledger
        .insert_all(vec![titled_link("One"), titled_link("Two"), titled_link("Three")])
        .await
        .unwrap();
    ledger.remove(ids[1]).await.unwrap();
    ledger.begin_pending().await;

    let client = ScriptedClient::always_ok();
    let (observer, mut progress) = ChannelObserver::new();
    let result = UploadExecutor::new(client.clone())
        .run(&ledger, BatchDefaults::default(), &observer)
        .await
        .unwrap();

    assert_eq!(client.submitted_indices(), vec![0, 2]);
    assert_eq!(
        result.outcomes.iter().map(|o| o.index).collect::<Vec<_>>(),
        vec![0, 2]
    );
    assert_eq!(result.summary.total, 2);

    let mut totals = Vec::new();
    while let Ok(update) = progress.try_recv() {
        totals.push(update.total);
    }
    assert_eq!(totals, vec![2, 2]);
}

#[tokio::test]
async fn test_unready_batch_submits_nothing() {
    let ledger = ItemLedger::new(Uuid::new_v4(), 50);
    ledger
        .insert_all(vec![
            titled_link("Ready"),
            PendingItem::from_link(
                None,
                "https://youtu.be/abc12345678".into(),
                DetectedType::VideoEmbed,
                "abc12345678".into(),
            ),
        ])
        .await
        .unwrap();
    // The video item stays Resolving; no resolver is running
    ledger.begin_pending().await;

    let client = ScriptedClient::always_ok();
    let err = UploadExecutor::new(client.clone())
        .run(&ledger, BatchDefaults::default(), &NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Precondition(_)));
    assert_eq!(client.call_count(), 0);
    assert!(!ledger.is_upload_running().await);
}

#[tokio::test]
async fn test_empty_batch_submits_nothing() {
    let ledger = ItemLedger::new(Uuid::new_v4(), 50);
    let client = ScriptedClient::always_ok();

    let err = UploadExecutor::new(client.clone())
        .run(&ledger, BatchDefaults::default(), &NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Precondition(_)));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_defaults_reach_every_request() {
    let (ledger, _) = ready_ledger(&["One", "Two"]).await;
    let client = ScriptedClient::always_ok();
    let defaults = BatchDefaults {
        folder_ids: vec!["folder-1".into()],
        collection_ids: vec!["col-9".into()],
        course_ids: Vec::new(),
    };

    UploadExecutor::new(client.clone())
        .run(&ledger, defaults.clone(), &NoopObserver)
        .await
        .unwrap();

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.defaults == defaults));
    assert_eq!(requests[0].title, "One");
    assert_eq!(requests[0].source_type, "generic-link");
}

#[tokio::test]
async fn test_ledger_is_locked_between_prepare_and_execute() {
    let (ledger, ids) = ready_ledger(&["One"]).await;
    let executor = UploadExecutor::new(ScriptedClient::always_ok());

    let prepared = executor
        .prepare(&ledger, BatchDefaults::default())
        .await
        .unwrap();
    assert_eq!(prepared.total(), 1);
    assert!(matches!(
        ledger.rename(ids[0], "Changed").await,
        Err(IngestError::UploadInProgress)
    ));

    let result = executor.execute(&ledger, prepared, &NoopObserver).await;
    assert_eq!(result.outcomes[0].title, "One");
    assert!(!ledger.is_upload_running().await);
}
