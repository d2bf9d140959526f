//! Integration tests for progress fan-out while transfers run.

use std::time::Duration;

use multiloader_core::{
    DownloadEngine, EngineOptions, Progress, ProgressEvent, ProgressFeed, TransferBatch,
    TransferOutcome, TransferRequest, TransferStatus,
};
use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

async fn mount_body(mock_server: &MockServer, len: usize) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; len]))
        .mount(mock_server)
        .await;
}

fn single_request_batch(temp: &TempDir, mock_server: &MockServer, id: &str) -> TransferBatch {
    TransferBatch::new(temp.path().to_str().unwrap()).with_request(TransferRequest::new(
        id,
        format!("{}/{id}.bin", mock_server.uri()),
        format!("{id}.bin"),
        "",
    ))
}

/// Snapshots already queued on `feed`, in order.
fn drain(feed: &mut ProgressFeed) -> Vec<Progress> {
    let mut seen = Vec::new();
    while let Some(event) = feed.try_next() {
        if let ProgressEvent::Progress(progress) = event {
            seen.push(progress);
        }
    }
    seen
}

#[tokio::test]
async fn test_every_subscriber_sees_the_same_sequence() {
    let mock_server = require_mock_server!();
    mount_body(&mock_server, 20_000).await;

    let temp = TempDir::new().unwrap();
    let engine = DownloadEngine::new(EngineOptions {
        chunk_size: 1024,
        subscriber_capacity: 1000,
        ..EngineOptions::default()
    })
    .unwrap();
    let mut first = engine.subscribe_progress();
    let mut second = engine.subscribe_progress();
    assert_eq!(engine.store().hub().subscriber_count(), 2);

    let outcomes = engine
        .start_transfers(single_request_batch(&temp, &mock_server, "x"))
        .unwrap()
        .wait()
        .await;
    assert_eq!(outcomes[0].1, TransferOutcome::Completed { bytes: 20_000 });

    let first_seen = drain(&mut first);
    let second_seen = drain(&mut second);
    assert!(!first_seen.is_empty());
    assert_eq!(first_seen, second_seen);
    assert_eq!(first_seen[0].status, TransferStatus::Downloading);
    assert_eq!(first_seen.last().unwrap().status, TransferStatus::Completed);
}

#[tokio::test]
async fn test_dropping_a_feed_unsubscribes_it() {
    let engine = DownloadEngine::new(EngineOptions::default()).unwrap();
    let kept = engine.subscribe_progress();
    let dropped = engine.subscribe_progress();
    assert_eq!(engine.store().hub().subscriber_count(), 2);

    drop(dropped);
    assert_eq!(engine.store().hub().subscriber_count(), 1);
    drop(kept);
    assert_eq!(engine.store().hub().subscriber_count(), 0);
}

#[tokio::test]
async fn test_stalled_subscriber_does_not_block_transfers() {
    let mock_server = require_mock_server!();
    mount_body(&mock_server, 64 * 1024).await;

    let temp = TempDir::new().unwrap();
    let engine = DownloadEngine::new(EngineOptions {
        chunk_size: 512,
        subscriber_capacity: 1,
        ..EngineOptions::default()
    })
    .unwrap();
    // Never read while the transfer runs
    let mut stalled = engine.subscribe_progress();

    let outcomes = tokio::time::timeout(
        Duration::from_secs(10),
        engine
            .start_transfers(single_request_batch(&temp, &mock_server, "big"))
            .unwrap()
            .wait(),
    )
    .await
    .expect("a full subscriber queue must not stall the transfer");
    assert_eq!(outcomes[0].1, TransferOutcome::Completed { bytes: 64 * 1024 });

    let queued = drain(&mut stalled);
    assert_eq!(queued.len(), 1, "only the first snapshot fits: {queued:?}");
    assert_eq!(
        engine.get_progress("big").unwrap().status,
        TransferStatus::Completed
    );
}

#[tokio::test]
async fn test_feed_keeps_idle_connection_alive_with_heartbeats() {
    let engine = DownloadEngine::new(EngineOptions {
        heartbeat_interval: Duration::from_millis(25),
        ..EngineOptions::default()
    })
    .unwrap();
    let mut feed = engine.subscribe_progress();

    assert_eq!(feed.next().await, Some(ProgressEvent::Connected));
    for _ in 0..2 {
        let event = tokio::time::timeout(Duration::from_secs(5), feed.next())
            .await
            .unwrap();
        assert_eq!(event, Some(ProgressEvent::Heartbeat));
    }
}

#[tokio::test]
async fn test_late_subscriber_reads_current_state_from_store() {
    let mock_server = require_mock_server!();
    mount_body(&mock_server, 4096).await;

    let temp = TempDir::new().unwrap();
    let engine = DownloadEngine::new(EngineOptions::default()).unwrap();
    engine
        .start_transfers(single_request_batch(&temp, &mock_server, "done"))
        .unwrap()
        .wait()
        .await;

    let mut late = engine.subscribe_progress();
    assert!(drain(&mut late).is_empty(), "feeds carry no history");

    let snapshot = engine.get_progress("done").unwrap();
    assert_eq!(snapshot.status, TransferStatus::Completed);
    assert_eq!(snapshot.downloaded_bytes, 4096);
    assert!((snapshot.percent - 100.0).abs() < f64::EPSILON);
}
