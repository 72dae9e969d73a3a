//! Re-sequencing buffer for ordered modes.
//!
//! Units of work complete out of order but each carries its [`SeqTag`]. The
//! unit at the head of the sequence writes straight through to the queue;
//! results of later units are held back until every earlier unit finished.
//! A unit may emit any number of results (flattening, concatenation).
//!
//! The buffer is unbounded: it grows with how far production runs ahead of
//! the slowest pending unit. Crossing the configured threshold is logged
//! once per driver, never enforced.

use crate::pipeline::id::SeqTag;
use crate::pipeline::queue::QueueWriter;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

struct Unit<T> {
    items: Vec<T>,
    done: bool,
}

impl<T> Default for Unit<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            done: false,
        }
    }
}

struct State<T> {
    head: SeqTag,
    pending: BTreeMap<SeqTag, Unit<T>>,
    buffered: usize,
    high_water: usize,
    warned: bool,
}

pub struct Resequencer<T> {
    state: Mutex<State<T>>,
    writer: QueueWriter<T>,
    warn_threshold: usize,
}

impl<T> Resequencer<T> {
    pub fn new(writer: QueueWriter<T>, warn_threshold: usize) -> Self {
        Self {
            state: Mutex::new(State {
                head: SeqTag::FIRST,
                pending: BTreeMap::new(),
                buffered: 0,
                high_water: 0,
                warned: false,
            }),
            writer,
            warn_threshold,
        }
    }

    /// Deliver a result of unit `tag`, or hold it until `tag` is the head.
    /// Returns false once the reader is gone.
    pub fn emit(&self, tag: SeqTag, item: T) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if tag == state.head {
            return self.writer.push(item);
        }
        state.pending.entry(tag).or_default().items.push(item);
        state.buffered += 1;
        state.high_water = state.high_water.max(state.buffered);
        if !state.warned && state.buffered > self.warn_threshold {
            state.warned = true;
            tracing::warn!(
                "Re-sequencing buffer holds {} results waiting on {}",
                state.buffered,
                state.head
            );
        }
        !self.writer.is_closed()
    }

    /// Mark unit `tag` settled. When it is the head, release every
    /// consecutive successor that is already buffered.
    pub fn finish(&self, tag: SeqTag) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if tag != state.head {
            state.pending.entry(tag).or_default().done = true;
            return;
        }
        state.head = tag.next();
        loop {
            let head = state.head;
            let Some(unit) = state.pending.remove(&head) else {
                break;
            };
            state.buffered -= unit.items.len();
            for item in unit.items {
                self.writer.push(item);
            }
            if !unit.done {
                break;
            }
            state.head = head.next();
        }
    }

    /// Results currently held back.
    pub fn buffered(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .buffered
    }

    /// Largest number of results held back at once.
    pub fn high_water(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .high_water
    }

    /// Whether the threshold warning has been logged.
    pub fn warned(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .warned
    }
}
