//! Fan-out/fan-in execution engine.
//!
//! A driver task pulls items from upstream one at a time and starts a
//! per-item action for each, without waiting for earlier actions:
//!
//! - **Concurrent**: actions are futures polled by the driver itself, so
//!   overlap comes purely from their suspension points.
//! - **Parallel**: every action is spawned as its own tokio task.
//!
//! Actions write results through an [`Emitter`] into one shared queue. The
//! queue is completed exactly once, after upstream is exhausted and every
//! dispatched action has settled, carrying the aggregated faults if any.
//! On cancellation the driver drops (concurrent) or aborts and reaps
//! (parallel) the outstanding actions before completing the queue.
//!
//! Sequential mode never spawns: actions run inline, pull by pull.

use crate::pipeline::cancel::ExecContext;
use crate::pipeline::error::{FaultCollector, PipelineError, PipelineResult};
use crate::pipeline::id::{SeqCounter, SeqTag};
use crate::pipeline::mode::{ScheduleMode, Strategy};
use crate::pipeline::node::Cursor;
use crate::pipeline::queue::{self, QueueOptions, QueueWriter};
use crate::pipeline::resequence::Resequencer;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, FuturesUnordered, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Per-item asynchronous action: receives the item, where to write its
/// results, and the token of the execution it belongs to.
pub type Action<T, U> =
    Arc<dyn Fn(T, Emitter<U>, CancellationToken) -> BoxFuture<'static, PipelineResult<()>> + Send + Sync>;

/// Build an [`Action`] from a closure.
pub fn action<T, U, F>(f: F) -> Action<T, U>
where
    F: Fn(T, Emitter<U>, CancellationToken) -> BoxFuture<'static, PipelineResult<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Items dispatched between forced yields of the driver task.
const DISPATCH_BATCH: u64 = 16;

enum Target<U> {
    Direct(Arc<QueueWriter<U>>),
    Ordered {
        tag: SeqTag,
        reseq: Arc<Resequencer<U>>,
    },
    Inline(Arc<Mutex<Vec<U>>>),
}

/// Write handle given to one dispatched action.
pub struct Emitter<U> {
    target: Target<U>,
}

impl<U> Emitter<U> {
    /// Deliver one result. Returns false once nobody is reading, which
    /// actions may treat as a hint to stop early.
    pub fn emit(&self, item: U) -> bool {
        match &self.target {
            Target::Direct(writer) => writer.push(item),
            Target::Ordered { tag, reseq } => reseq.emit(*tag, item),
            Target::Inline(buffer) => {
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(item);
                true
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn join_error(err: JoinError) -> PipelineError {
    if err.is_panic() {
        PipelineError::Panicked(panic_message(err.into_panic()))
    } else {
        PipelineError::Cancelled
    }
}

/// Outstanding actions of one driver.
enum InFlight {
    Local(FuturesUnordered<BoxFuture<'static, PipelineResult<()>>>),
    Workers(JoinSet<PipelineResult<()>>),
}

impl InFlight {
    fn new(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Parallel => InFlight::Workers(JoinSet::new()),
            _ => InFlight::Local(FuturesUnordered::new()),
        }
    }

    fn dispatch(&mut self, unit: BoxFuture<'static, PipelineResult<()>>) {
        match self {
            InFlight::Local(futures) => futures.push(unit),
            InFlight::Workers(workers) => {
                workers.spawn(unit);
            }
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            InFlight::Local(futures) => futures.is_empty(),
            InFlight::Workers(workers) => workers.is_empty(),
        }
    }

    fn len(&self) -> usize {
        match self {
            InFlight::Local(futures) => futures.len(),
            InFlight::Workers(workers) => workers.len(),
        }
    }

    /// Wait for the next action to settle.
    async fn settled(&mut self) -> Option<PipelineResult<()>> {
        match self {
            InFlight::Local(futures) => futures.next().await,
            InFlight::Workers(workers) => workers
                .join_next()
                .await
                .map(|joined| joined.unwrap_or_else(|e| Err(join_error(e)))),
        }
    }

    /// Stop every outstanding action and wait until none is running.
    async fn shutdown(&mut self) {
        match self {
            InFlight::Local(futures) => futures.clear(),
            InFlight::Workers(workers) => {
                workers.abort_all();
                while workers.join_next().await.is_some() {}
            }
        }
    }
}

struct Driver<T, U> {
    source: Cursor<T>,
    mode: ScheduleMode,
    action: Action<T, U>,
    writer: Arc<QueueWriter<U>>,
    reseq: Option<Arc<Resequencer<U>>>,
    token: CancellationToken,
}

impl<T: Send + 'static, U: Send + 'static> Driver<T, U> {
    /// Wrap one action so that panics become faults and, in ordered modes,
    /// its sequence slot is released however it ends.
    fn unit(&self, tag: SeqTag, item: T) -> BoxFuture<'static, PipelineResult<()>> {
        let target = match &self.reseq {
            Some(reseq) => Target::Ordered {
                tag,
                reseq: reseq.clone(),
            },
            None => Target::Direct(self.writer.clone()),
        };
        let action = (self.action)(item, Emitter { target }, self.token.clone());
        let reseq = self.reseq.clone();
        async move {
            let outcome = AssertUnwindSafe(action)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload))));
            if let Some(reseq) = reseq {
                reseq.finish(tag);
            }
            outcome
        }
        .boxed()
    }

    async fn run(mut self) {
        let strategy = self.mode.strategy();
        tracing::debug!("Driver started ({})", self.mode);

        let mut in_flight = InFlight::new(strategy);
        let mut faults = FaultCollector::new();
        let mut tags = SeqCounter::new();
        let mut upstream_done = false;
        let mut upstream_cancelled = false;
        let token = self.token.clone();

        let cancelled = loop {
            if upstream_done && in_flight.is_empty() {
                break false;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => break true,
                settled = in_flight.settled(), if !in_flight.is_empty() => {
                    if let Some(Err(err)) = settled {
                        faults.record(err);
                    }
                }
                item = self.source.next(), if !upstream_done => match item {
                    Some(Ok(item)) => {
                        let unit = self.unit(tags.assign(), item);
                        in_flight.dispatch(unit);
                        // an always-ready upstream must not starve the reader
                        if tags.issued() % DISPATCH_BATCH == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                    Some(Err(err)) => {
                        upstream_done = true;
                        upstream_cancelled = !faults.record(err);
                    }
                    None => upstream_done = true,
                },
            }
        };

        if cancelled {
            tracing::debug!(
                "Driver cancelled with {} actions in flight",
                in_flight.len()
            );
            in_flight.shutdown().await;
        }
        self.source.close().await;

        let outcome = match faults.finish() {
            _ if cancelled => Err(PipelineError::Cancelled),
            Some(err) => Err(err),
            None if upstream_cancelled => Err(PipelineError::Cancelled),
            None => Ok(()),
        };
        if let Some(reseq) = &self.reseq {
            if reseq.high_water() > 0 {
                tracing::trace!("Re-sequencing high water mark: {}", reseq.high_water());
            }
        }
        tracing::debug!(
            "Driver finished ({}): {} items dispatched, ok = {}",
            self.mode,
            tags.issued(),
            outcome.is_ok()
        );
        self.writer.complete(outcome);
    }
}

fn spawn_engine<T, U>(
    source: Cursor<T>,
    mode: ScheduleMode,
    action: Action<T, U>,
    ctx: &ExecContext,
) -> Cursor<U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    let (writer, reader) = match queue::channel(QueueOptions::unbounded()) {
        Ok(pair) => pair,
        Err(err) => return Cursor::failed(err, ctx),
    };
    let reseq = if mode.is_ordered() {
        match writer.try_clone() {
            Ok(w) => Some(Arc::new(Resequencer::new(
                w,
                ctx.config().resequence_warn_threshold,
            ))),
            Err(err) => return Cursor::failed(err, ctx),
        }
    } else {
        None
    };
    let driver = Driver {
        source,
        mode,
        action,
        writer: Arc::new(writer),
        reseq,
        token: ctx.token().clone(),
    };
    match ctx.spawn_driver(driver.run()) {
        Ok(()) => Cursor::new(reader, ctx),
        Err(err) => Cursor::failed(err, ctx),
    }
}

/// Run `action` for every item of `source` with cooperative overlap on a
/// single driver task. `mode` selects ordered or unordered delivery.
pub fn run_concurrently<T, U>(
    source: Cursor<T>,
    mode: ScheduleMode,
    action: Action<T, U>,
    ctx: &ExecContext,
) -> Cursor<U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    spawn_engine(source, mode.make_concurrent(), action, ctx)
}

/// Run `action` for every item of `source`, each on its own worker task.
/// `mode` selects ordered or unordered delivery.
pub fn run_in_parallel<T, U>(
    source: Cursor<T>,
    mode: ScheduleMode,
    action: Action<T, U>,
    ctx: &ExecContext,
) -> Cursor<U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    spawn_engine(source, mode.make_parallel(), action, ctx)
}

/// Run `action` inline for one item at a time, in pull order.
pub fn run_sequentially<T, U>(source: Cursor<T>, action: Action<T, U>, ctx: &ExecContext) -> Cursor<U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    let token = ctx.token().clone();
    let results = source
        .then(move |item| {
            let action = action.clone();
            let token = token.clone();
            async move {
                let buffer = Arc::new(Mutex::new(Vec::new()));
                let emitter = Emitter {
                    target: Target::Inline(buffer.clone()),
                };
                let outcome = match item {
                    Ok(item) => action(item, emitter, token).await,
                    Err(err) => Err(err),
                };
                let items = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
                let mut batch: Vec<PipelineResult<U>> = items.into_iter().map(Ok).collect();
                if let Err(err) = outcome {
                    batch.push(Err(err));
                }
                stream::iter(batch)
            }
        })
        .flatten();
    Cursor::new(results, ctx)
}

/// Pick the worker strategy from `mode`.
pub fn run_scheduled<T, U>(
    source: Cursor<T>,
    mode: ScheduleMode,
    action: Action<T, U>,
    ctx: &ExecContext,
) -> Cursor<U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    match mode.strategy() {
        Strategy::Sequential => run_sequentially(source, action, ctx),
        Strategy::Concurrent => run_concurrently(source, mode, action, ctx),
        Strategy::Parallel => run_in_parallel(source, mode, action, ctx),
    }
}
