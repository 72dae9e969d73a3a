//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::future::Future;
use std::time::{Duration, Instant};

/// Upper bound for anything that should finish "immediately"
pub fn test_timeout() -> Duration {
    Duration::from_millis(250)
}

/// Run `fut` and return its output together with how long it took
pub async fn timed<F: Future>(fut: F) -> (F::Output, Duration) {
    let started = Instant::now();
    let output = fut.await;
    (output, started.elapsed())
}

/// Assert that an elapsed time stays below a bound
pub fn assert_faster_than(elapsed: Duration, bound: Duration) {
    assert!(
        elapsed < bound,
        "Expected to finish within {:?}, took {:?}",
        bound,
        elapsed
    );
}
