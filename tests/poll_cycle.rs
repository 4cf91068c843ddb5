// Reconciliation: feed ids against stored records.

mod common;

use common::*;
use hn_relay::engine::{PollReport, Reconciler};
use hn_relay::queue::Action;
use hn_relay::store::StoryRecord;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn reconciler(feed: Arc<FakeFeed>, store: Arc<ScriptedStore>, queue: Arc<RecordingQueue>) -> Reconciler {
    Reconciler::new(feed, store, queue, 30, Duration::from_secs(30))
}

fn record(id: i64, message_id: i64) -> StoryRecord {
    StoryRecord { id, message_id, last_save: t0() }
}

#[tokio::test]
async fn known_ids_update_and_new_ids_create() {
    let feed = Arc::new(FakeFeed::default());
    *feed.top.lock().unwrap() = vec![10, 11, 12];
    let store = Arc::new(ScriptedStore::with_records(vec![record(11, 110)]));
    let queue = Arc::new(RecordingQueue::default());

    let report = reconciler(feed, store, queue.clone()).run_poll().await.unwrap();

    let mut actions = queue.actions();
    actions.sort_by_key(|a| a.item_id());
    assert_eq!(
        actions,
        vec![
            Action::Create { item_id: 10 },
            Action::Update { item_id: 11, message_id: 110 },
            Action::Create { item_id: 12 },
        ]
    );
    assert_eq!(
        report,
        PollReport { fetched: 3, created: 2, updated: 1, ..Default::default() }
    );
}

#[tokio::test]
async fn failed_key_is_skipped_others_proceed() {
    let feed = Arc::new(FakeFeed::default());
    *feed.top.lock().unwrap() = vec![1, 2, 3];
    let store = Arc::new(ScriptedStore::with_records(vec![record(3, 30)]));
    store.failing_keys.lock().unwrap().insert(2);
    let queue = Arc::new(RecordingQueue::default());

    let report = reconciler(feed, store, queue.clone()).run_poll().await.unwrap();

    assert_eq!(report.skipped, 1);
    let ids: Vec<i64> = queue.actions().iter().map(|a| a.item_id()).collect();
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&2));
}

#[tokio::test]
async fn every_item_classified_exactly_once() {
    let feed = Arc::new(FakeFeed::default());
    *feed.top.lock().unwrap() = (1..=30).collect();
    let store = Arc::new(ScriptedStore::with_records(
        (1..=30).filter(|id| id % 3 == 0).map(|id| record(id, id * 100)).collect(),
    ));
    store.failing_keys.lock().unwrap().extend([5, 25]);
    let queue = Arc::new(RecordingQueue::default());

    let report = reconciler(feed, store, queue.clone()).run_poll().await.unwrap();

    assert_eq!(report.created + report.updated + report.skipped, 30);
    assert_eq!(report.updated, 10);
    assert_eq!(report.skipped, 2);
    let mut ids: Vec<i64> = queue.actions().iter().map(|a| a.item_id()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 28);
}

#[tokio::test]
async fn duplicate_feed_ids_classified_once() {
    let feed = Arc::new(FakeFeed::default());
    *feed.top.lock().unwrap() = vec![7, 8, 7, 9, 8];
    let store = Arc::new(ScriptedStore::default());
    let queue = Arc::new(RecordingQueue::default());

    let report = reconciler(feed, store, queue.clone()).run_poll().await.unwrap();

    assert_eq!(report.fetched, 5);
    assert_eq!(report.duplicates, 2);
    assert_eq!(queue.actions().len(), 3);
}

#[tokio::test]
async fn batch_size_limits_ids() {
    let feed = Arc::new(FakeFeed::default());
    *feed.top.lock().unwrap() = (1..=50).collect();
    let queue = Arc::new(RecordingQueue::default());

    let report = reconciler(feed, Arc::new(ScriptedStore::default()), queue.clone())
        .run_poll()
        .await
        .unwrap();
    assert_eq!(report.fetched, 30);
    assert_eq!(queue.actions().len(), 30);
}

#[tokio::test]
async fn empty_feed_submits_nothing() {
    let feed = Arc::new(FakeFeed::default());
    let queue = Arc::new(RecordingQueue::default());

    let report = reconciler(feed, Arc::new(ScriptedStore::default()), queue.clone())
        .run_poll()
        .await
        .unwrap();
    assert_eq!(report, PollReport::default());
    assert!(queue.actions().is_empty());
}

#[tokio::test]
async fn submit_failure_is_isolated() {
    let feed = Arc::new(FakeFeed::default());
    *feed.top.lock().unwrap() = vec![1, 2, 3];
    let queue = Arc::new(RecordingQueue::default());
    queue.reject.lock().unwrap().insert(2);

    let report = reconciler(feed, Arc::new(ScriptedStore::default()), queue.clone())
        .run_poll()
        .await
        .unwrap();
    assert_eq!(report.submit_failed, 1);
    assert_eq!(report.created, 2);
}

#[tokio::test]
async fn feed_outage_fails_the_cycle() {
    let feed = Arc::new(FakeFeed::default());
    feed.fail_top.store(true, Ordering::SeqCst);
    let queue = Arc::new(RecordingQueue::default());

    let result = reconciler(feed, Arc::new(ScriptedStore::default()), queue.clone())
        .run_poll()
        .await;
    assert!(result.is_err());
    assert!(queue.actions().is_empty());
}

#[tokio::test]
async fn whole_lookup_failure_fails_the_cycle() {
    let feed = Arc::new(FakeFeed::default());
    *feed.top.lock().unwrap() = vec![1, 2];
    let store = Arc::new(ScriptedStore::default());
    store.fail_get_multi.store(true, Ordering::SeqCst);
    let queue = Arc::new(RecordingQueue::default());

    let result = reconciler(feed, store, queue.clone()).run_poll().await;
    assert!(result.is_err());
    assert!(queue.actions().is_empty());
}
