//! Transform nodes: per-item operations dispatched through the engine.
//!
//! `map`, `then`, `filter` and `filter_map` all become a [`Transform`]
//! holding one per-item action. The node inherits its parent's mode; in
//! sequential mode the action runs inline, otherwise it is fanned out by
//! the executor.

use crate::pipeline::cancel::ExecContext;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::executor::{action, run_scheduled, Action};
use crate::pipeline::mode::ScheduleMode;
use crate::pipeline::node::{Cursor, Flow, Operator};
use futures::future::{Future, FutureExt};
use std::sync::Arc;

pub struct Transform<T, U> {
    name: &'static str,
    parent: Flow<T>,
    mode: ScheduleMode,
    action: Action<T, U>,
}

impl<T: Send + 'static, U: Send + 'static> Operator<U> for Transform<T, U> {
    fn name(&self) -> &str {
        self.name
    }

    fn mode(&self) -> ScheduleMode {
        self.mode
    }

    fn open(&self, ctx: &ExecContext) -> Cursor<U> {
        let scope = ctx.child();
        let upstream = self.parent.open(&scope);
        run_scheduled(upstream, self.mode, self.action.clone(), &scope)
    }
}

impl<T: Send + 'static> Flow<T> {
    /// Attach a per-item action as a new node inheriting this node's mode.
    pub fn transform<U: Send + 'static>(&self, name: &'static str, action: Action<T, U>) -> Flow<U> {
        Flow::new(Transform {
            name,
            parent: self.clone(),
            mode: self.mode(),
            action,
        })
    }

    /// Synchronous projection. In parallel mode `f` runs on the workers.
    pub fn map<U, F>(&self, f: F) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.transform(
            "Map",
            action(move |item, emitter, _token| {
                let f = f.clone();
                async move {
                    emitter.emit(f(item));
                    Ok(())
                }
                .boxed()
            }),
        )
    }

    /// Asynchronous, fallible projection.
    pub fn then<U, F, Fut>(&self, f: F) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PipelineResult<U>> + Send + 'static,
    {
        self.transform(
            "Then",
            action(move |item, emitter, _token| {
                let pending = f(item);
                async move {
                    emitter.emit(pending.await?);
                    Ok::<_, PipelineError>(())
                }
                .boxed()
            }),
        )
    }

    pub fn filter<F>(&self, predicate: F) -> Flow<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        self.transform(
            "Filter",
            action(move |item, emitter, _token| {
                let predicate = predicate.clone();
                async move {
                    if predicate(&item) {
                        emitter.emit(item);
                    }
                    Ok(())
                }
                .boxed()
            }),
        )
    }

    /// Asynchronous filter and projection in one step.
    pub fn filter_map<U, F, Fut>(&self, f: F) -> Flow<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PipelineResult<Option<U>>> + Send + 'static,
    {
        self.transform(
            "FilterMap",
            action(move |item, emitter, _token| {
                let pending = f(item);
                async move {
                    if let Some(value) = pending.await? {
                        emitter.emit(value);
                    }
                    Ok::<_, PipelineError>(())
                }
                .boxed()
            }),
        )
    }
}
