//! Integration tests for fault aggregation

mod common;

use common::builders::DelayFlowBuilder;
use futures::stream;
use lazyflow_rs::{Flow, LazyFlowError, PipelineError, ResultExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn test_single_fault_surfaces_unwrapped() {
    let err = DelayFlowBuilder::new(&[10, 20, 30])
        .fail_on(20)
        .concurrent(false)
        .to_vec()
        .await
        .unwrap_err();
    assert!(!err.is_aggregate());
    assert_eq!(err.to_string(), "Action error: item 20 failed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_faults_are_aggregated_after_all_settle() {
    let settled = Arc::new(AtomicUsize::new(0));
    let counter = settled.clone();
    let flow = Flow::from_iter(vec![30u64, 10, 20, 40])
        .as_parallel(false)
        .then(move |ms| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                if ms != 40 {
                    return Err(PipelineError::msg(format!("{}ms worker failed", ms)));
                }
                Ok(ms)
            }
        });

    let mut cursor = flow.iter();
    let mut delivered = Vec::new();
    let mut failure = None;
    while let Some(item) = futures::StreamExt::next(&mut cursor).await {
        match item {
            Ok(v) => delivered.push(v),
            Err(e) => failure = Some(e),
        }
    }
    cursor.close().await;

    assert_eq!(delivered, vec![40]);
    assert_eq!(settled.load(Ordering::SeqCst), 4);
    let err = failure.expect("aggregate failure");
    assert!(err.is_aggregate());
    // completion order is deterministic given the delays
    let messages: Vec<String> = err.faults().iter().map(|f| f.to_string()).collect();
    assert_eq!(
        messages,
        vec![
            "Action error: 10ms worker failed",
            "Action error: 20ms worker failed",
            "Action error: 30ms worker failed",
        ]
    );
    assert!(err.to_string().starts_with("3 operations failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upstream_failure_joins_action_faults() {
    let source = Flow::from_try_stream(|| {
        stream::iter(vec![
            Ok(5u64),
            Ok(15),
            Err(PipelineError::upstream(anyhow::anyhow!("sensor read failed"))),
            Ok(99),
        ])
    });
    let flow = DelayFlowBuilder::new(&[])
        .fail_on(5)
        .echo(source.as_concurrent(true));
    let err = flow.to_vec().await.unwrap_err();
    assert!(err.is_aggregate());
    let faults = err.faults();
    assert_eq!(faults.len(), 2);
    assert!(faults.iter().any(|f| matches!(f, PipelineError::Source(_))));
    assert!(faults.iter().any(|f| f.to_string().contains("item 5 failed")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_worker_is_a_fault() {
    let flow = Flow::from_iter(vec![1u32, 2, 3]).as_parallel(true).map(|n| {
        if n == 2 {
            panic!("bad sample {}", n);
        }
        n
    });
    let err = flow.to_vec().await.unwrap_err();
    assert!(matches!(&err, PipelineError::Panicked(msg) if msg.contains("bad sample 2")));
}

#[tokio::test]
async fn test_fault_converts_with_context() {
    let outcome = DelayFlowBuilder::new(&[1])
        .fail_on(1)
        .sequential()
        .to_vec()
        .await
        .context("Reading samples");
    let err = outcome.unwrap_err();
    assert!(matches!(err, LazyFlowError::WithContext { .. }));
    assert_eq!(
        err.to_string(),
        "Reading samples: Pipeline error: Action error: item 1 failed"
    );
}
