//! Mode override nodes: `as_concurrent`, `as_parallel`, `as_sequential`.
//!
//! An override does no work of its own: it forwards to its parent and only
//! changes the mode that downstream operators inherit.

use crate::pipeline::cancel::ExecContext;
use crate::pipeline::mode::{ScheduleMode, Strategy};
use crate::pipeline::node::{Cursor, Flow, Operator};

pub struct ModeOverride<T> {
    parent: Flow<T>,
    mode: ScheduleMode,
}

impl<T: Send + 'static> Operator<T> for ModeOverride<T> {
    fn name(&self) -> &str {
        "ModeOverride"
    }

    fn mode(&self) -> ScheduleMode {
        self.mode
    }

    fn open(&self, ctx: &ExecContext) -> Cursor<T> {
        self.parent.open(ctx)
    }
}

impl<T: Send + 'static> Flow<T> {
    /// Returns `self` unchanged when it already runs in `mode`.
    pub fn with_mode(&self, mode: ScheduleMode) -> Flow<T> {
        if self.mode() == mode {
            return self.clone();
        }
        Flow::new(ModeOverride {
            parent: self.clone(),
            mode,
        })
    }

    /// Overlap downstream work cooperatively on one driver task.
    pub fn as_concurrent(&self, preserve_order: bool) -> Flow<T> {
        self.with_mode(ScheduleMode::from_parts(Strategy::Concurrent, preserve_order))
    }

    /// Run downstream work on one worker task per item.
    pub fn as_parallel(&self, preserve_order: bool) -> Flow<T> {
        self.with_mode(ScheduleMode::from_parts(Strategy::Parallel, preserve_order))
    }

    pub fn as_sequential(&self) -> Flow<T> {
        self.with_mode(ScheduleMode::Sequential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_sets_mode() {
        let flow = Flow::from_iter(vec![1, 2]);
        assert_eq!(
            flow.as_concurrent(false).mode(),
            ScheduleMode::ConcurrentUnordered
        );
        assert_eq!(flow.as_parallel(true).mode(), ScheduleMode::ParallelOrdered);
    }

    #[test]
    fn test_same_mode_returns_same_node() {
        let flow = Flow::from_iter(vec![1, 2]).as_concurrent(true);
        assert!(Flow::ptr_eq(&flow, &flow.as_concurrent(true)));
        assert!(!Flow::ptr_eq(&flow, &flow.as_concurrent(false)));

        let seq = Flow::from_iter(vec![1, 2]);
        assert!(Flow::ptr_eq(&seq, &seq.as_sequential()));

        let par = seq.as_parallel(false);
        assert!(Flow::ptr_eq(&par, &par.as_parallel(false)));
        assert_eq!(par.as_sequential().mode(), ScheduleMode::Sequential);
    }

    #[tokio::test]
    async fn test_override_forwards_items() {
        let flow = Flow::from_iter(vec![1, 2, 3]).as_parallel(true);
        assert_eq!(flow.to_vec().await.unwrap(), vec![1, 2, 3]);
    }
}
