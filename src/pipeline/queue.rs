//! Result queue connecting producers (drivers, workers, push sources) to the
//! single consumer-facing reader.
//!
//! The buffer is lock-free (`SegQueue` when unbounded, `ArrayQueue` when
//! bounded). Completion is a one-shot slot: the first `complete` wins, and a
//! queue whose last writer goes away without completing is completed with
//! `Cancelled`, so a reader can never wait forever.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crossbeam_queue::{ArrayQueue, SegQueue};
use futures::task::AtomicWaker;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

/// What a bounded queue does with an item that does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overflow {
    /// Evict the oldest buffered item to make room.
    DropOldest,
    /// Discard the incoming item.
    DropNewest,
}

/// Buffering policy of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferPolicy {
    Unbounded,
    Bounded { capacity: usize, overflow: Overflow },
}

/// Per-call queue configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    pub policy: BufferPolicy,
    /// Whether more than one writer handle may exist.
    pub multi_writer: bool,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl QueueOptions {
    /// Unbounded, many writers. Used by every engine queue.
    pub fn unbounded() -> Self {
        Self {
            policy: BufferPolicy::Unbounded,
            multi_writer: true,
        }
    }

    /// Bounded, lossy queue. A capacity of zero is rejected.
    pub fn bounded(capacity: usize, overflow: Overflow) -> PipelineResult<Self> {
        let options = Self {
            policy: BufferPolicy::Bounded { capacity, overflow },
            multi_writer: true,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn single_writer(mut self) -> Self {
        self.multi_writer = false;
        self
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if let BufferPolicy::Bounded { capacity: 0, .. } = self.policy {
            return Err(PipelineError::InvalidArgument(
                "bounded queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

enum Buffer<T> {
    Unbounded(SegQueue<T>),
    Bounded { queue: ArrayQueue<T>, overflow: Overflow },
}

impl<T> Buffer<T> {
    fn pop(&self) -> Option<T> {
        match self {
            Buffer::Unbounded(q) => q.pop(),
            Buffer::Bounded { queue, .. } => queue.pop(),
        }
    }
}

struct Shared<T> {
    buffer: Buffer<T>,
    completed: AtomicBool,
    completion: Mutex<Option<PipelineResult<()>>>,
    writers: AtomicUsize,
    reader_closed: AtomicBool,
    dropped: AtomicU64,
    multi_writer: bool,
    waker: AtomicWaker,
}

impl<T> Shared<T> {
    fn complete(&self, outcome: PipelineResult<()>) -> bool {
        let mut slot = self.completion.lock().unwrap_or_else(PoisonError::into_inner);
        if self.completed.load(Ordering::Acquire) {
            return false;
        }
        *slot = Some(outcome);
        self.completed.store(true, Ordering::Release);
        drop(slot);
        self.waker.wake();
        true
    }
}

/// Create a queue, returning its first writer and its only reader.
pub fn channel<T>(options: QueueOptions) -> PipelineResult<(QueueWriter<T>, QueueReader<T>)> {
    options.validate()?;
    let buffer = match options.policy {
        BufferPolicy::Unbounded => Buffer::Unbounded(SegQueue::new()),
        BufferPolicy::Bounded { capacity, overflow } => Buffer::Bounded {
            queue: ArrayQueue::new(capacity),
            overflow,
        },
    };
    let shared = Arc::new(Shared {
        buffer,
        completed: AtomicBool::new(false),
        completion: Mutex::new(None),
        writers: AtomicUsize::new(1),
        reader_closed: AtomicBool::new(false),
        dropped: AtomicU64::new(0),
        multi_writer: options.multi_writer,
        waker: AtomicWaker::new(),
    });
    Ok((
        QueueWriter {
            shared: shared.clone(),
        },
        QueueReader {
            shared,
            finished: false,
        },
    ))
}

/// Producer handle.
pub struct QueueWriter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> QueueWriter<T> {
    /// Another writer handle for the same queue. Fails on single-writer queues.
    pub fn try_clone(&self) -> PipelineResult<Self> {
        if !self.shared.multi_writer {
            return Err(PipelineError::InvalidArgument(
                "queue was created for a single writer".to_string(),
            ));
        }
        self.shared.writers.fetch_add(1, Ordering::AcqRel);
        Ok(Self {
            shared: self.shared.clone(),
        })
    }

    /// Enqueue an item. Returns false if it was not accepted: the reader is
    /// gone, the queue is complete, or a `DropNewest` buffer is full.
    pub fn push(&self, item: T) -> bool {
        let shared = &self.shared;
        if shared.completed.load(Ordering::Acquire) || shared.reader_closed.load(Ordering::Acquire)
        {
            return false;
        }
        let accepted = match &shared.buffer {
            Buffer::Unbounded(q) => {
                q.push(item);
                true
            }
            Buffer::Bounded {
                queue,
                overflow: Overflow::DropOldest,
            } => {
                if queue.force_push(item).is_some() {
                    shared.dropped.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            Buffer::Bounded {
                queue,
                overflow: Overflow::DropNewest,
            } => match queue.push(item) {
                Ok(()) => true,
                Err(_) => {
                    shared.dropped.fetch_add(1, Ordering::Relaxed);
                    false
                }
            },
        };
        shared.waker.wake();
        accepted
    }

    /// Mark the queue complete. Only the first call has any effect.
    pub fn complete(&self, outcome: PipelineResult<()>) -> bool {
        self.shared.complete(outcome)
    }

    /// True once the reader was dropped.
    pub fn is_closed(&self) -> bool {
        self.shared.reader_closed.load(Ordering::Acquire)
    }
}

impl<T> Drop for QueueWriter<T> {
    fn drop(&mut self) {
        if self.shared.writers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.complete(Err(PipelineError::Cancelled));
        }
    }
}

/// The single consumer handle. Yields buffered items, then the completion
/// outcome: nothing on success, one error otherwise.
pub struct QueueReader<T> {
    shared: Arc<Shared<T>>,
    finished: bool,
}

impl<T> QueueReader<T> {
    /// Items lost to a bounded overflow policy.
    pub fn dropped_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    fn finish(&mut self) -> Option<PipelineResult<T>> {
        self.finished = true;
        let outcome = self
            .shared
            .completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match outcome {
            Some(Err(err)) => Some(Err(err)),
            _ => None,
        }
    }
}

impl<T> Stream for QueueReader<T> {
    type Item = PipelineResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if let Some(item) = self.shared.buffer.pop() {
            return Poll::Ready(Some(Ok(item)));
        }
        self.shared.waker.register(cx.waker());
        if let Some(item) = self.shared.buffer.pop() {
            return Poll::Ready(Some(Ok(item)));
        }
        if self.shared.completed.load(Ordering::Acquire) {
            // Items pushed before completion are still delivered first.
            if let Some(item) = self.shared.buffer.pop() {
                return Poll::Ready(Some(Ok(item)));
            }
            return Poll::Ready(self.finish());
        }
        Poll::Pending
    }
}

impl<T> Drop for QueueReader<T> {
    fn drop(&mut self) {
        self.shared.reader_closed.store(true, Ordering::Release);
    }
}
