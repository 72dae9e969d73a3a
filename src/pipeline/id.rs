//! Identity types for in-flight work.

use std::fmt;

/// Input-order index attached to a dispatched unit of work.
///
/// Tags are assigned by the driver in the order items are pulled from
/// upstream; ordered modes use them to restore that order at the output.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SeqTag(pub u64);

impl SeqTag {
    pub const FIRST: SeqTag = SeqTag(0);

    #[inline]
    pub fn next(self) -> SeqTag {
        SeqTag(self.0 + 1)
    }
}

impl fmt::Debug for SeqTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqTag({})", self.0)
    }
}

impl fmt::Display for SeqTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Hands out sequence tags in increasing order.
#[derive(Debug, Default)]
pub struct SeqCounter {
    next: SeqTag,
}

impl SeqCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self) -> SeqTag {
        let tag = self.next;
        self.next = tag.next();
        tag
    }

    /// Number of tags handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.0
    }
}
