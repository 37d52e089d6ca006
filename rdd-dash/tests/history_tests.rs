//! History workflow tests

mod helpers;

use chrono::{TimeZone, Utc};
use helpers::{identity, measurements, signed_in_ui, MemoryRecordStore};
use rdd_common::{Identity, PredictionRecord};
use rdd_dash::workflow::{HistoryError, HistorySource, HistoryWorkflow};
use std::sync::atomic::Ordering;

fn record_at(owner: &Identity, result: &str, secs: i64) -> PredictionRecord {
    let mut record = PredictionRecord::image(owner, result);
    record.timestamp = Some(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap());
    record
}

fn results(records: &[PredictionRecord]) -> Vec<&str> {
    records.iter().map(|r| r.result.as_str()).collect()
}

/// Three records for alice interleaved with two for bob, stored oldest first
fn seeded_store() -> std::sync::Arc<MemoryRecordStore> {
    let store = MemoryRecordStore::new();
    let alice = identity("alice");
    let bob = identity("bob");

    store.seed(record_at(&alice, "T1", 10));
    store.seed(record_at(&bob, "bob-1", 15));
    store.seed(record_at(&alice, "T2", 20));
    store.seed(record_at(&bob, "bob-2", 25));
    store.seed(record_at(&alice, "T3", 30));
    store
}

#[tokio::test]
async fn test_owner_query_returns_newest_first() {
    let store = seeded_store();
    let history = HistoryWorkflow::new(store.clone());

    let page = history.fetch_history(&identity("alice")).await.unwrap();

    assert_eq!(page.source, HistorySource::OwnerQuery);
    assert_eq!(results(&page.records), vec!["T3", "T2", "T1"]);
    assert_eq!(store.owner_queries.load(Ordering::SeqCst), 1);
    assert_eq!(store.full_scans.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fallback_scan_returns_same_subset_in_same_order() {
    let store = seeded_store();
    let history = HistoryWorkflow::new(store.clone());
    let primary = history.fetch_history(&identity("alice")).await.unwrap();

    store.fail_owner_query.store(true, Ordering::SeqCst);
    let fallback = history.fetch_history(&identity("alice")).await.unwrap();

    assert_eq!(fallback.source, HistorySource::FullScan);
    assert_eq!(fallback.records, primary.records);
    assert!(fallback.records.iter().all(|r| r.owner_id == "alice"));
    assert_eq!(store.full_scans.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_both_queries_failing_reports_both_errors() {
    let store = seeded_store();
    store.fail_owner_query.store(true, Ordering::SeqCst);
    store.fail_list_all.store(true, Ordering::SeqCst);
    let history = HistoryWorkflow::new(store);

    let err = history.fetch_history(&identity("alice")).await.unwrap_err();

    let HistoryError::Unavailable { primary, fallback } = &err;
    assert!(primary.to_string().contains("missing index"));
    assert!(fallback.to_string().contains("permission denied"));
}

#[tokio::test]
async fn test_refresh_keeps_previous_history_when_both_queries_fail() {
    let store = seeded_store();
    let history = HistoryWorkflow::new(store.clone());
    let alice = identity("alice");
    let ui = signed_in_ui("alice");

    let page = history.refresh(&ui, &alice).await.unwrap();
    assert_eq!(ui.history(), page.records);

    store.seed(record_at(&alice, "T4", 40));
    store.fail_owner_query.store(true, Ordering::SeqCst);
    store.fail_list_all.store(true, Ordering::SeqCst);

    assert!(history.refresh(&ui, &alice).await.is_none());
    assert_eq!(results(&ui.history()), vec!["T3", "T2", "T1"]);
}

#[tokio::test]
async fn test_refresh_replaces_history_on_success() {
    let store = seeded_store();
    let history = HistoryWorkflow::new(store.clone());
    let alice = identity("alice");
    let ui = signed_in_ui("alice");

    history.refresh(&ui, &alice).await.unwrap();
    store.seed(record_at(&alice, "T4", 40));
    history.refresh(&ui, &alice).await.unwrap();

    assert_eq!(results(&ui.history()), vec!["T4", "T3", "T2", "T1"]);
}

#[tokio::test]
async fn test_record_without_timestamp_sorts_last() {
    let store = MemoryRecordStore::new();
    let alice = identity("alice");
    store.seed(PredictionRecord::tabular(&alice, "pending", measurements()));
    store.seed(record_at(&alice, "T1", 10));
    store.seed(record_at(&alice, "T2", 20));

    let page = HistoryWorkflow::new(store)
        .fetch_history(&alice)
        .await
        .unwrap();

    assert_eq!(results(&page.records), vec!["T2", "T1", "pending"]);
    assert!(page.records[2].timestamp.is_none());
}

#[tokio::test]
async fn test_empty_history() {
    let store = seeded_store();
    let page = HistoryWorkflow::new(store)
        .fetch_history(&identity("nobody"))
        .await
        .unwrap();

    assert!(page.records.is_empty());
    assert_eq!(page.source, HistorySource::OwnerQuery);
}
