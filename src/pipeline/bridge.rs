//! Push-to-pull boundary between event producers and lazy pipelines.
//!
//! A [`Subject`] accepts pushed events (`on_next`, `on_error`,
//! `on_completed`) and hands them to every cursor currently reading from
//! [`Subject::flow`]. Each cursor subscribes when it is opened, gets its own
//! queue and unsubscribes when dropped. Events pushed while nobody is
//! subscribed are not retained.

use crate::config::EngineConfig;
use crate::pipeline::cancel::ExecContext;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{Cursor, Flow, Operator};
use crate::pipeline::queue::{self, QueueOptions, QueueReader, QueueWriter};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

/// How a subject ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Terminal {
    Completed,
    Failed(String),
}

impl Terminal {
    fn outcome(&self) -> PipelineResult<()> {
        match self {
            Terminal::Completed => Ok(()),
            Terminal::Failed(message) => Err(PipelineError::upstream(anyhow::anyhow!(message.clone()))),
        }
    }
}

struct State<T> {
    next_id: u64,
    subscribers: HashMap<u64, QueueWriter<T>>,
    terminal: Option<Terminal>,
}

struct Shared<T> {
    options: QueueOptions,
    state: Mutex<State<T>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unsubscribe(&self, id: u64) {
        if self.lock().subscribers.remove(&id).is_some() {
            tracing::trace!("Subject subscriber {} detached", id);
        }
    }
}

/// Multicast push source.
pub struct Subject<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// Subject whose subscribers buffer without limit.
    pub fn new() -> Self {
        Self::build(QueueOptions::unbounded())
    }

    /// Subject with a custom per-subscriber queue, e.g. a bounded lossy one.
    pub fn with_options(options: QueueOptions) -> PipelineResult<Self> {
        options.validate()?;
        Ok(Self::build(options))
    }

    /// Subject using the configured bridge queue options.
    pub fn from_config(config: &EngineConfig) -> PipelineResult<Self> {
        Self::with_options(config.bridge_queue)
    }

    fn build(options: QueueOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                state: Mutex::new(State {
                    next_id: 0,
                    subscribers: HashMap::new(),
                    terminal: None,
                }),
            }),
        }
    }

    /// Push one value to every live subscriber. Returns how many accepted it.
    /// Ignored once the subject has ended.
    pub fn on_next(&self, value: T) -> usize {
        let mut state = self.shared.lock();
        if state.terminal.is_some() {
            return 0;
        }
        state.subscribers.retain(|_, writer| !writer.is_closed());
        state
            .subscribers
            .values()
            .filter(|writer| writer.push(value.clone()))
            .count()
    }

    /// End every subscription with an error.
    pub fn on_error(&self, message: impl std::fmt::Display) {
        self.terminate(Terminal::Failed(message.to_string()));
    }

    /// End every subscription successfully.
    pub fn on_completed(&self) {
        self.terminate(Terminal::Completed);
    }

    fn terminate(&self, terminal: Terminal) {
        let mut state = self.shared.lock();
        if state.terminal.is_some() {
            return;
        }
        for (_, writer) in state.subscribers.drain() {
            writer.complete(terminal.outcome());
        }
        tracing::trace!("Subject terminated: {:?}", terminal);
        state.terminal = Some(terminal);
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().subscribers.len()
    }

    /// Lazy source reading from this subject.
    pub fn flow(&self) -> Flow<T> {
        Flow::new(SubjectSource {
            shared: Arc::downgrade(&self.shared),
        })
    }
}

struct SubjectSource<T> {
    shared: Weak<Shared<T>>,
}

impl<T: Clone + Send + 'static> Operator<T> for SubjectSource<T> {
    fn name(&self) -> &str {
        "Subject"
    }

    fn open(&self, ctx: &ExecContext) -> Cursor<T> {
        let scope = ctx.child();
        let Some(shared) = self.shared.upgrade() else {
            return Cursor::failed(PipelineError::Cancelled, &scope);
        };
        let (writer, reader) = match queue::channel(shared.options) {
            Ok(pair) => pair,
            Err(err) => return Cursor::failed(err, &scope),
        };

        let mut state = shared.lock();
        if let Some(outcome) = state.terminal.as_ref().map(Terminal::outcome) {
            drop(state);
            writer.complete(outcome);
            return Cursor::new(reader, &scope);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.insert(id, writer);
        drop(state);
        tracing::trace!("Subject subscriber {} attached", id);

        let subscription = Subscription {
            reader,
            id,
            shared: Arc::downgrade(&shared),
        };
        Cursor::new(subscription, &scope)
    }
}

/// Reader side of one subscription; detaches itself when dropped.
struct Subscription<T> {
    reader: QueueReader<T>,
    id: u64,
    shared: Weak<Shared<T>>,
}

impl<T> Stream for Subscription<T> {
    type Item = PipelineResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.reader).poll_next(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::queue::Overflow;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_subscribe_on_open_and_receive() {
        let subject = Subject::new();
        let mut cursor = subject.flow().map(|x: i32| x * 2).iter();
        assert_eq!(subject.subscriber_count(), 1);

        assert_eq!(subject.on_next(1), 1);
        assert_eq!(subject.on_next(2), 1);
        subject.on_completed();

        let mut out = Vec::new();
        while let Some(item) = cursor.next().await {
            out.push(item.unwrap());
        }
        assert_eq!(out, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let subject = Subject::<u8>::new();
        let cursor = subject.flow().iter();
        assert_eq!(subject.subscriber_count(), 1);
        drop(cursor);
        assert_eq!(subject.subscriber_count(), 0);
        assert_eq!(subject.on_next(1), 0);
    }

    #[tokio::test]
    async fn test_error_and_late_subscriber() {
        let subject = Subject::<u8>::new();
        let mut early = subject.flow().iter();
        subject.on_error("sensor offline");

        let err = early.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("sensor offline"));

        let late = subject.flow().to_vec().await.unwrap_err();
        assert!(late.to_string().contains("sensor offline"));
        assert_eq!(subject.on_next(3), 0);
    }

    #[tokio::test]
    async fn test_bounded_subscriber_drops_newest() {
        let options = QueueOptions::bounded(2, Overflow::DropNewest).unwrap();
        let subject = Subject::with_options(options).unwrap();
        let cursor = subject.flow().iter();
        assert_eq!(subject.on_next(1), 1);
        assert_eq!(subject.on_next(2), 1);
        assert_eq!(subject.on_next(3), 0);
        subject.on_completed();
        let out: Vec<u32> = cursor.map(|r| r.unwrap()).collect().await;
        assert_eq!(out, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_dropped_subject_ends_readers() {
        let subject = Subject::<u8>::new();
        let mut cursor = subject.flow().iter();
        drop(subject);
        assert!(cursor.next().await.unwrap().unwrap_err().is_cancelled());
    }
}
