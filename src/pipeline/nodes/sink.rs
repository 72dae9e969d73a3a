//! Terminal operations: drive a flow to completion and collect or consume
//! its results.

use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::Flow;
use futures::future::Future;
use futures::stream::StreamExt;
use tokio_util::sync::CancellationToken;

impl<T: Send + 'static> Flow<T> {
    /// Collect every result. The first error aborts the run and is returned.
    pub async fn to_vec(&self) -> PipelineResult<Vec<T>> {
        self.to_vec_with(&CancellationToken::new()).await
    }

    pub async fn to_vec_with(&self, token: &CancellationToken) -> PipelineResult<Vec<T>> {
        let mut cursor = self.iter_with(token);
        let mut items = Vec::new();
        let outcome = loop {
            match cursor.next().await {
                Some(Ok(item)) => items.push(item),
                Some(Err(err)) => break Err(err),
                None => break Ok(()),
            }
        };
        cursor.close().await;
        outcome.map(|_| items)
    }

    /// First result, if any. Everything still running upstream is cancelled
    /// and awaited before this returns.
    pub async fn first(&self) -> PipelineResult<Option<T>> {
        let mut cursor = self.iter();
        let head = cursor.next().await.transpose();
        cursor.close().await;
        head
    }

    pub async fn count(&self) -> PipelineResult<usize> {
        let mut cursor = self.iter();
        let mut n = 0;
        let outcome = loop {
            match cursor.next().await {
                Some(Ok(_)) => n += 1,
                Some(Err(err)) => break Err(err),
                None => break Ok(n),
            }
        };
        cursor.close().await;
        outcome
    }

    /// Run `f` on every result in delivery order.
    pub async fn for_each<F, Fut>(&self, mut f: F) -> PipelineResult<()>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = PipelineResult<()>>,
    {
        let mut cursor = self.iter();
        let outcome = loop {
            match cursor.next().await {
                Some(Ok(item)) => {
                    if let Err(err) = f(item).await {
                        break Err(err);
                    }
                }
                Some(Err(err)) => break Err(err),
                None => break Ok(()),
            }
        };
        cursor.close().await;
        outcome
    }
}
