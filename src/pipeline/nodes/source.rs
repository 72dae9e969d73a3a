//! Source nodes: adapters from pull-based data sources.
//!
//! Every source holds a factory, so each opened cursor starts a fresh,
//! independent pass over the data.

use crate::pipeline::cancel::ExecContext;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{Cursor, Flow, Operator};
use futures::future::{self, Future};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::sync::Arc;

type StreamFactory<T> = Arc<dyn Fn() -> BoxStream<'static, PipelineResult<T>> + Send + Sync>;

/// Root node wrapping a true data source.
pub struct SourceNode<T> {
    name: &'static str,
    factory: StreamFactory<T>,
}

impl<T: Send + 'static> Operator<T> for SourceNode<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn open(&self, ctx: &ExecContext) -> Cursor<T> {
        Cursor::new((self.factory)(), &ctx.child())
    }
}

impl<T: Send + 'static> Flow<T> {
    fn source(name: &'static str, factory: StreamFactory<T>) -> Self {
        Flow::new(SourceNode { name, factory })
    }

    /// In-memory collection. Cloned once per iteration.
    pub fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
        I::IntoIter: Send + 'static,
    {
        Self::source(
            "FromIter",
            Arc::new(move || stream::iter(items.clone().into_iter().map(Ok::<T, PipelineError>)).boxed()),
        )
    }

    /// Infallible stream, produced fresh by `factory` for every iteration.
    pub fn from_stream<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        Self::source("FromStream", Arc::new(move || factory().map(Ok::<T, PipelineError>).boxed()))
    }

    /// Fallible stream; an error item ends the iteration with that error.
    pub fn from_try_stream<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = PipelineResult<T>> + Send + 'static,
    {
        Self::source("FromTryStream", Arc::new(move || factory().boxed()))
    }

    /// Single value produced by a future.
    pub fn once<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PipelineResult<T>> + Send + 'static,
    {
        Self::source("Once", Arc::new(move || stream::once(factory()).boxed()))
    }

    pub fn empty() -> Self {
        Self::source("Empty", Arc::new(|| stream::empty::<PipelineResult<T>>().boxed()))
    }

    /// Fails every iteration with the error built by `error`.
    pub fn fail<F>(error: F) -> Self
    where
        F: Fn() -> PipelineError + Send + Sync + 'static,
    {
        Self::source(
            "Fail",
            Arc::new(move || stream::once(future::ready(Err::<T, _>(error()))).boxed()),
        )
    }
}
