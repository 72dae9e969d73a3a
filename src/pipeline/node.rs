//! Node abstraction for lazy pipelines.
//!
//! Two layers:
//! - **`Operator` trait**: one immutable pipeline stage. Alongside the way to
//!   open a fresh execution it exposes its schedule mode, which defaults to
//!   `Sequential` for any node that does not say otherwise (plain sources,
//!   user-defined adapters).
//! - **`Flow` handle**: a shared, cheaply clonable reference to an operator.
//!   Parents are held as `Flow`s, so one stage can feed several children.
//!
//! Opening a node yields a [`Cursor`]: a stream of results that owns its
//! cancellation token and cancels it when dropped.

use crate::config::EngineConfig;
use crate::pipeline::cancel::{DriverRegistry, ExecContext};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::mode::ScheduleMode;
use futures::future::Future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// One stage of a lazily-evaluated pipeline.
pub trait Operator<T>: Send + Sync {
    /// Human-readable name of this node.
    fn name(&self) -> &str {
        "Operator"
    }

    fn mode(&self) -> ScheduleMode {
        ScheduleMode::Sequential
    }

    /// Start a fresh, independent execution under `ctx`.
    fn open(&self, ctx: &ExecContext) -> Cursor<T>;
}

/// Shared handle to a pipeline node.
pub struct Flow<T> {
    op: Arc<dyn Operator<T>>,
}

impl<T> Clone for Flow<T> {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
        }
    }
}

impl<T: Send + 'static> Flow<T> {
    pub fn new(op: impl Operator<T> + 'static) -> Self {
        Self { op: Arc::new(op) }
    }

    pub fn name(&self) -> &str {
        self.op.name()
    }

    pub fn mode(&self) -> ScheduleMode {
        self.op.mode()
    }

    /// True when both handles point at the same node instance.
    pub fn ptr_eq(a: &Flow<T>, b: &Flow<T>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&a.op), Arc::as_ptr(&b.op))
    }

    /// Open this node as part of an enclosing execution.
    pub fn open(&self, ctx: &ExecContext) -> Cursor<T> {
        self.op.open(ctx)
    }

    /// Fresh root cursor with its own cancellation scope.
    pub fn iter(&self) -> Cursor<T> {
        self.iter_with(&CancellationToken::new())
    }

    /// Fresh root cursor linked to an external cancellation token.
    pub fn iter_with(&self, token: &CancellationToken) -> Cursor<T> {
        self.iter_configured(token, Arc::new(EngineConfig::default()))
    }

    pub fn iter_configured(&self, token: &CancellationToken, config: Arc<EngineConfig>) -> Cursor<T> {
        let ctx = ExecContext::root(token, config);
        let mut cursor = self.op.open(&ctx);
        cursor.token = ctx.token().clone();
        cursor.root = Some(ctx.drivers().clone());
        cursor
    }
}

/// A stream that stops after cancellation or the first error.
struct Guarded<T> {
    inner: BoxStream<'static, PipelineResult<T>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    done: bool,
}

impl<T> Stream for Guarded<T> {
    type Item = PipelineResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        if self.cancelled.as_mut().poll(cx).is_ready() {
            self.done = true;
            return Poll::Ready(Some(Err(PipelineError::Cancelled)));
        }
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Err(err))) => {
                self.done = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// One execution of a node: the consumer's pull handle.
///
/// Dropping a cursor raises its own cancellation token, which reaches every
/// producer and worker opened beneath it. [`Cursor::close`] does the same and
/// then waits for spawned drivers to settle.
pub struct Cursor<T> {
    stream: BoxStream<'static, PipelineResult<T>>,
    token: CancellationToken,
    root: Option<DriverRegistry>,
}

impl<T: Send + 'static> Cursor<T> {
    /// Wrap a result stream as a cursor running under `ctx`.
    pub fn new<S>(stream: S, ctx: &ExecContext) -> Self
    where
        S: Stream<Item = PipelineResult<T>> + Send + 'static,
    {
        let token = ctx.token().clone();
        let guarded = Guarded {
            inner: stream.boxed(),
            cancelled: Box::pin(token.clone().cancelled_owned()),
            done: false,
        };
        Self {
            stream: guarded.boxed(),
            token,
            root: None,
        }
    }

    /// A cursor that yields one error and ends.
    pub fn failed(err: PipelineError, ctx: &ExecContext) -> Self {
        Self::new(stream::once(async move { Err(err) }), ctx)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop this execution early and release everything it owns.
    ///
    /// For a root cursor this waits until every driver spawned under it has
    /// finished, so no worker outlives the call.
    pub async fn close(mut self) {
        self.token.cancel();
        drop(std::mem::replace(&mut self.stream, stream::empty().boxed()));
        if let Some(drivers) = self.root.take() {
            drivers.join_all().await;
        }
    }
}

impl<T> Stream for Cursor<T> {
    type Item = PipelineResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

impl<T> Drop for Cursor<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
