//! Instrumented sources for teardown tests

use futures::stream::{self, StreamExt};
use lazyflow_rs::Flow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters shared between a [`tracked_source`] and the test
#[derive(Clone, Default)]
pub struct SourceProbe {
    opened: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

impl SourceProbe {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    /// Streams opened but not yet released
    pub fn live(&self) -> usize {
        self.opened() - self.dropped()
    }
}

struct DropGuard(Arc<AtomicUsize>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Endless source yielding `0, 1, 2, ...`, one item every `every`
pub fn tracked_source(every: Duration) -> (Flow<u64>, SourceProbe) {
    let probe = SourceProbe::default();
    let counters = probe.clone();
    let flow = Flow::from_stream(move || {
        counters.opened.fetch_add(1, Ordering::SeqCst);
        let guard = DropGuard(counters.dropped.clone());
        let pulled = counters.pulled.clone();
        stream::iter(0u64..).then(move |n| {
            let _held = &guard;
            let pulled = pulled.clone();
            async move {
                tokio::time::sleep(every).await;
                pulled.fetch_add(1, Ordering::SeqCst);
                n
            }
        })
    });
    (flow, probe)
}
