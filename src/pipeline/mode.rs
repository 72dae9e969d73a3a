//! Schedule mode algebra.
//!
//! A schedule mode combines a worker strategy (sequential, concurrent,
//! parallel) with an ordering flavour (ordered, unordered). All helpers are
//! pure total functions over the five modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution mode of a pipeline node. Fixed when the node is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScheduleMode {
    /// Pull-by-pull, one item at a time.
    #[default]
    Sequential,
    /// Cooperative overlap on the driver task, results in input order.
    ConcurrentOrdered,
    /// Cooperative overlap on the driver task, results in completion order.
    ConcurrentUnordered,
    /// One worker task per item, results in input order.
    ParallelOrdered,
    /// One worker task per item, results in completion order.
    ParallelUnordered,
}

/// Worker strategy component of a [`ScheduleMode`], ordered by permissiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
    Sequential,
    Concurrent,
    Parallel,
}

impl ScheduleMode {
    /// Build a mode from its strategy and ordering components.
    ///
    /// `Sequential` ignores the ordering flag.
    pub fn from_parts(strategy: Strategy, ordered: bool) -> Self {
        match (strategy, ordered) {
            (Strategy::Sequential, _) => ScheduleMode::Sequential,
            (Strategy::Concurrent, true) => ScheduleMode::ConcurrentOrdered,
            (Strategy::Concurrent, false) => ScheduleMode::ConcurrentUnordered,
            (Strategy::Parallel, true) => ScheduleMode::ParallelOrdered,
            (Strategy::Parallel, false) => ScheduleMode::ParallelUnordered,
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            ScheduleMode::Sequential => Strategy::Sequential,
            ScheduleMode::ConcurrentOrdered | ScheduleMode::ConcurrentUnordered => {
                Strategy::Concurrent
            }
            ScheduleMode::ParallelOrdered | ScheduleMode::ParallelUnordered => Strategy::Parallel,
        }
    }

    /// Force the concurrent strategy, keeping the ordering flavour.
    /// A sequential mode becomes `ConcurrentOrdered`.
    pub fn make_concurrent(self) -> Self {
        Self::from_parts(Strategy::Concurrent, self.is_ordered())
    }

    /// Force the parallel strategy, keeping the ordering flavour.
    /// A sequential mode becomes `ParallelOrdered`.
    pub fn make_parallel(self) -> Self {
        Self::from_parts(Strategy::Parallel, self.is_ordered())
    }

    /// Force the ordered flavour, keeping the strategy.
    pub fn make_ordered(self) -> Self {
        Self::from_parts(self.strategy(), true)
    }

    /// Force the unordered flavour, keeping the strategy.
    /// `Sequential` has no unordered flavour and stays as it is.
    pub fn make_unordered(self) -> Self {
        Self::from_parts(self.strategy(), false)
    }

    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            ScheduleMode::Sequential
                | ScheduleMode::ConcurrentOrdered
                | ScheduleMode::ParallelOrdered
        )
    }

    pub fn is_unordered(self) -> bool {
        !self.is_ordered()
    }

    pub fn is_parallel(self) -> bool {
        self.strategy() == Strategy::Parallel
    }

    pub fn is_sequential(self) -> bool {
        self == ScheduleMode::Sequential
    }

    /// Mode of a node that merges two branches (concatenation).
    ///
    /// The strategy is the most permissive of the two; the result is
    /// unordered only when a non-sequential branch asked for it.
    pub fn combine(self, other: Self) -> Self {
        let strategy = self.strategy().max(other.strategy());
        let unordered = self.is_unordered() || other.is_unordered();
        Self::from_parts(strategy, !unordered)
    }
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScheduleMode::Sequential => "sequential",
            ScheduleMode::ConcurrentOrdered => "concurrent-ordered",
            ScheduleMode::ConcurrentUnordered => "concurrent-unordered",
            ScheduleMode::ParallelOrdered => "parallel-ordered",
            ScheduleMode::ParallelUnordered => "parallel-unordered",
        };
        f.write_str(name)
    }
}
