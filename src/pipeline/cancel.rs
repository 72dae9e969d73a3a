//! Cancellation propagation and driver bookkeeping.
//!
//! Every cursor runs under an [`ExecContext`] whose token is a child of the
//! context it was opened from, so cancelling a consumer reaches every
//! producer and worker beneath it. Driver tasks spawned under one root cursor
//! are recorded in a shared [`DriverRegistry`]; closing the root awaits them.

use crate::config::EngineConfig;
use crate::pipeline::error::{PipelineError, PipelineResult};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Execution scope handed to operators when a cursor is opened.
#[derive(Clone)]
pub struct ExecContext {
    token: CancellationToken,
    drivers: DriverRegistry,
    config: Arc<EngineConfig>,
}

impl ExecContext {
    /// Root scope linked to an external token.
    pub fn root(parent: &CancellationToken, config: Arc<EngineConfig>) -> Self {
        Self {
            token: parent.child_token(),
            drivers: DriverRegistry::default(),
            config,
        }
    }

    /// Nested scope: cancelled whenever this one is, or on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            drivers: self.drivers.clone(),
            config: self.config.clone(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    /// Spawn a detached driver on the current tokio runtime and record its
    /// handle so the root cursor can await it during teardown.
    pub fn spawn_driver<F>(&self, driver: F) -> PipelineResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;
        self.drivers.register(handle.spawn(driver));
        Ok(())
    }
}

/// Join handles of every driver spawned under one root cursor.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl DriverRegistry {
    fn register(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Drivers that have not finished yet.
    pub fn active(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Await every registered driver, including ones registered while
    /// waiting (inner sequences opened by a draining driver).
    pub async fn join_all(&self) {
        loop {
            let batch = std::mem::take(
                &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        tracing::warn!("Driver task panicked: {}", e);
                    }
                }
            }
        }
    }
}
