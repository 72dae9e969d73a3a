//! Concatenation of two flows.
//!
//! Sequential concatenation drains the first branch, then the second.
//! In any other mode both branches are raced into one queue by the engine;
//! the queue completes once both have finished, and an ordered mode still
//! releases the second branch's results only after the first's.

use super::select_many::drain_into;
use crate::pipeline::cancel::ExecContext;
use crate::pipeline::executor::run_scheduled;
use crate::pipeline::mode::ScheduleMode;
use crate::pipeline::node::{Cursor, Flow, Operator};
use futures::stream::{self, StreamExt};

pub struct Concat<T> {
    first: Flow<T>,
    second: Flow<T>,
    mode: ScheduleMode,
}

impl<T: Send + 'static> Operator<T> for Concat<T> {
    fn name(&self) -> &str {
        "Concat"
    }

    fn mode(&self) -> ScheduleMode {
        self.mode
    }

    fn open(&self, ctx: &ExecContext) -> Cursor<T> {
        let scope = ctx.child();
        if self.mode.is_sequential() {
            let first = self.first.open(&scope);
            let second = self.second.open(&scope);
            return Cursor::new(first.chain(second), &scope);
        }

        let branches = stream::iter([Ok(self.first.clone()), Ok(self.second.clone())]);
        let branches = Cursor::new(branches, &scope.child());
        run_scheduled(branches, self.mode, drain_into(scope.clone()), &scope)
    }
}

impl<T: Send + 'static> Flow<T> {
    /// Results of `self` followed by (or, when unordered, raced with) the
    /// results of `other`.
    pub fn concat(&self, other: &Flow<T>) -> Flow<T> {
        Flow::new(Concat {
            first: self.clone(),
            second: other.clone(),
            mode: self.mode().combine(other.mode()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::PipelineError;
    use std::time::Duration;

    fn slow(items: Vec<u64>, ms: u64) -> Flow<u64> {
        Flow::from_iter(items).then(move |n| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(n)
        })
    }

    #[tokio::test]
    async fn test_sequential_concat() {
        let flow = Flow::from_iter(vec![1, 2, 3, 4]).concat(&Flow::from_iter(vec![5, 6]));
        assert_eq!(flow.mode(), ScheduleMode::Sequential);
        assert_eq!(flow.to_vec().await.unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_concurrent_concat_races_branches() {
        let a = slow(vec![1, 2, 3, 4], 40);
        let b = slow(vec![5, 6], 1).as_concurrent(false);
        let flow = a.concat(&b);
        assert_eq!(flow.mode(), ScheduleMode::ConcurrentUnordered);
        let out = flow.to_vec().await.unwrap();
        assert_eq!(&out[..2], &[5, 6]);
        let mut sorted = out.clone();
        sorted.sort();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_ordered_concat_releases_in_branch_order() {
        let a = slow(vec![1, 2], 30).as_concurrent(true);
        let b = slow(vec![3, 4], 1);
        let flow = a.concat(&b);
        assert_eq!(flow.mode(), ScheduleMode::ConcurrentOrdered);
        assert_eq!(flow.to_vec().await.unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_concat_failure_in_one_branch() {
        let a = Flow::from_iter(vec![1u64]).as_concurrent(false);
        let b = Flow::from_iter(vec![2u64]).then(|_| async { Err::<u64, _>(PipelineError::msg("b failed")) });
        let err = a.concat(&b).to_vec().await.unwrap_err();
        assert_eq!(err.to_string(), "Action error: b failed");
    }
}
