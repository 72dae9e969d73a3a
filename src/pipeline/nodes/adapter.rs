//! Adapter nodes: forwarders that do no concurrency work of their own.
//!
//! `take`, `skip` and `inspect` rewrite the parent's result stream in
//! place and inherit its mode. `take` drops its upstream cursor as soon as
//! it has produced `n` items, which cancels everything still running above.

use crate::pipeline::cancel::ExecContext;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::mode::ScheduleMode;
use crate::pipeline::node::{Cursor, Flow, Operator};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;

type Adapt<T, U> = Arc<dyn Fn(Cursor<T>) -> BoxStream<'static, PipelineResult<U>> + Send + Sync>;

pub struct Adapter<T, U> {
    name: &'static str,
    parent: Flow<T>,
    adapt: Adapt<T, U>,
}

impl<T: Send + 'static, U: Send + 'static> Operator<U> for Adapter<T, U> {
    fn name(&self) -> &str {
        self.name
    }

    fn mode(&self) -> ScheduleMode {
        self.parent.mode()
    }

    fn open(&self, ctx: &ExecContext) -> Cursor<U> {
        let scope = ctx.child();
        let upstream = self.parent.open(&scope);
        Cursor::new((self.adapt)(upstream), &scope)
    }
}

impl<T: Send + 'static> Flow<T> {
    fn adapt<U: Send + 'static>(&self, name: &'static str, adapt: Adapt<T, U>) -> Flow<U> {
        Flow::new(Adapter {
            name,
            parent: self.clone(),
            adapt,
        })
    }

    /// First `count` results, then stop and release upstream.
    pub fn take(&self, count: usize) -> Flow<T> {
        self.adapt(
            "Take",
            Arc::new(move |upstream: Cursor<T>| {
                stream::unfold((Some(upstream), count), |(upstream, remaining)| async move {
                    let mut upstream = upstream?;
                    if remaining == 0 {
                        return None;
                    }
                    let item = upstream.next().await?;
                    let remaining = if item.is_ok() { remaining - 1 } else { 0 };
                    let upstream = (remaining > 0).then_some(upstream);
                    Some((item, (upstream, remaining)))
                })
                .boxed()
            }),
        )
    }

    /// Discard the first `count` results.
    pub fn skip(&self, count: usize) -> Flow<T> {
        self.adapt(
            "Skip",
            Arc::new(move |upstream: Cursor<T>| {
                let mut skipped = 0usize;
                upstream
                    .filter(move |item| {
                        let keep = item.is_err() || skipped >= count;
                        if !keep {
                            skipped += 1;
                        }
                        future::ready(keep)
                    })
                    .boxed()
            }),
        )
    }

    /// Observe each result without changing it.
    pub fn inspect<F>(&self, f: F) -> Flow<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.adapt(
            "Inspect",
            Arc::new(move |upstream: Cursor<T>| {
                let f = f.clone();
                upstream
                    .inspect(move |item| {
                        if let Ok(value) = item {
                            f(value);
                        }
                    })
                    .boxed()
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_take_and_skip() {
        let flow = Flow::from_iter(1..=10);
        assert_eq!(flow.take(3).to_vec().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(flow.skip(7).to_vec().await.unwrap(), vec![8, 9, 10]);
        assert_eq!(flow.skip(2).take(2).to_vec().await.unwrap(), vec![3, 4]);
        assert!(flow.take(0).to_vec().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_take_stops_pulling() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let flow = Flow::from_iter(1..=100).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(flow.take(2).to_vec().await.unwrap(), vec![1, 2]);
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_adapters_inherit_mode() {
        let flow = Flow::from_iter(vec![1]).as_concurrent(false);
        assert_eq!(flow.take(1).mode(), ScheduleMode::ConcurrentUnordered);
        assert_eq!(flow.skip(1).inspect(|_| {}).mode(), ScheduleMode::ConcurrentUnordered);
    }
}
