//! Flattening: every outer item selects an inner flow whose results are
//! spliced into the output.
//!
//! Sequential mode drains inner flows one at a time in outer order. Any
//! other mode dispatches one draining action per outer item through the
//! engine, so inner flows overlap and ordered modes keep each inner flow's
//! results together in outer order.

use crate::pipeline::cancel::ExecContext;
use crate::pipeline::error::PipelineError;
use crate::pipeline::executor::{action, run_scheduled, Action, Emitter};
use crate::pipeline::mode::ScheduleMode;
use crate::pipeline::node::{Cursor, Flow, Operator};
use futures::future::{self, FutureExt};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

type Selector<T, U> = Arc<dyn Fn(T) -> Flow<U> + Send + Sync>;

pub struct SelectMany<T, U> {
    parent: Flow<T>,
    mode: ScheduleMode,
    selector: Selector<T, U>,
}

/// Action that opens `flow` under `scope` and forwards all of its results.
pub(crate) fn drain_into<U: Send + 'static>(scope: ExecContext) -> Action<Flow<U>, U> {
    action(move |flow: Flow<U>, emitter: Emitter<U>, _token| {
        let mut inner = flow.open(&scope.child());
        async move {
            while let Some(next) = inner.next().await {
                if !emitter.emit(next?) {
                    break;
                }
            }
            Ok::<_, PipelineError>(())
        }
        .boxed()
    })
}

impl<T: Send + 'static, U: Send + 'static> Operator<U> for SelectMany<T, U> {
    fn name(&self) -> &str {
        "SelectMany"
    }

    fn mode(&self) -> ScheduleMode {
        self.mode
    }

    fn open(&self, ctx: &ExecContext) -> Cursor<U> {
        let scope = ctx.child();
        let selector = self.selector.clone();
        let upstream = self.parent.open(&scope);

        if self.mode.is_sequential() {
            let inner_scope = scope.clone();
            let flat = upstream.flat_map(move |item| match item {
                Ok(item) => selector(item).open(&inner_scope).boxed(),
                Err(err) => stream::once(future::ready(Err(err))).boxed(),
            });
            return Cursor::new(flat, &scope);
        }

        let inner_flows = Cursor::new(upstream.map(move |item| item.map(|i| selector(i))), &scope.child());
        run_scheduled(inner_flows, self.mode, drain_into(scope.clone()), &scope)
    }
}

impl<T: Send + 'static> Flow<T> {
    /// Project every item to an inner flow and flatten the results.
    pub fn select_many<U, F>(&self, selector: F) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Flow<U> + Send + Sync + 'static,
    {
        Flow::new(SelectMany {
            parent: self.clone(),
            mode: self.mode(),
            selector: Arc::new(selector),
        })
    }

    /// Alias of [`Flow::select_many`].
    pub fn flat_map<U, F>(&self, selector: F) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Flow<U> + Send + Sync + 'static,
    {
        self.select_many(selector)
    }
}
