//! Integration tests for early exit and teardown
//!
//! - Consumers that stop early release sources and workers
//! - External tokens cancel running executions
//! - `close` waits for every spawned driver

mod common;

use common::builders::DelayFlowBuilder;
use common::mock_helpers::tracked_source;
use common::{assert_faster_than, test_timeout, timed};
use futures::StreamExt;
use lazyflow_rs::{Flow, PipelineError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread")]
async fn test_first_on_endless_concurrent_pipeline() {
    let (source, probe) = tracked_source(Duration::from_millis(1));
    let flow = source.as_concurrent(false).map(|n| n * 2);

    let (head, elapsed) = timed(flow.first()).await;
    assert_eq!(head.unwrap(), Some(0));
    assert_faster_than(elapsed, test_timeout());
    assert_eq!(probe.opened(), 1);
    assert_eq!(probe.live(), 0, "source must be released once first() returns");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_take_releases_parallel_pipeline() {
    let (source, probe) = tracked_source(Duration::from_millis(1));
    let flow = source
        .as_parallel(true)
        .then(|n| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(n)
        })
        .take(5);
    assert_eq!(flow.to_vec().await.unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(probe.live(), 0);

    let pulled = probe.pulled();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(probe.pulled(), pulled, "nothing may keep pulling after teardown");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropping_cursor_stops_workers() {
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let (s, f) = (started.clone(), finished.clone());
    let flow = Flow::from_iter(0u64..8).as_concurrent(false).then(move |n| {
        s.fetch_add(1, Ordering::SeqCst);
        let f = f.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(if n == 0 { 1 } else { 400 })).await;
            f.fetch_add(1, Ordering::SeqCst);
            Ok(n)
        }
    });

    let mut cursor = flow.iter();
    assert_eq!(cursor.next().await.unwrap().unwrap(), 0);
    drop(cursor);

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(started.load(Ordering::SeqCst), 8);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_external_token_cancels_run() {
    let token = CancellationToken::new();
    let flow = DelayFlowBuilder::new(&[5, 10_000, 10_000]).concurrent(true);

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let (outcome, elapsed) = timed(flow.to_vec_with(&token)).await;
    let err = outcome.unwrap_err();
    assert!(err.is_cancelled(), "unexpected error: {}", err);
    assert_faster_than(elapsed, Duration::from_millis(1_000));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_waits_for_drivers() {
    let (source, probe) = tracked_source(Duration::from_millis(2));
    let flow = source
        .as_concurrent(true)
        .map(|n| n + 1)
        .as_parallel(false)
        .map(|n| n * 3);

    let mut cursor = flow.iter();
    for _ in 0..3 {
        assert!(cursor.next().await.unwrap().is_ok());
    }
    cursor.close().await;
    assert_eq!(probe.live(), 0);
}

#[tokio::test]
async fn test_cancelled_is_not_reported_as_fault() {
    let token = CancellationToken::new();
    token.cancel();
    let err = DelayFlowBuilder::new(&[1, 2])
        .concurrent(false)
        .to_vec_with(&token)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
}
