//! Lazy asynchronous pipeline architecture.
//!
//! A pipeline is a chain of immutable [`Operator`] nodes behind shared
//! [`Flow`] handles. Nothing runs until a [`Cursor`] is opened; each cursor is
//! an independent execution that owns its cancellation scope.
//!
//! # Architecture
//!
//! ```text
//! [Source] ──► [AsConcurrent] ──► [Then] ──► [Filter] ──► Cursor
//!                                   │
//!                          Driver task + result queue
//! ```
//!
//! # Design
//!
//! - **Schedule modes**: every node carries one of five [`ScheduleMode`]s and
//!   passes it on to the operators built from it.
//! - **One engine**: non-sequential operators hand a per-item [`Action`] to
//!   the executor, which runs it on the driver (concurrent) or on worker
//!   tasks (parallel) and merges results into one [`queue`].
//! - **Ordering**: ordered modes tag work with [`SeqTag`]s and a
//!   [`Resequencer`] restores input order.
//! - **Faults**: every failure is collected; one is surfaced as-is, several
//!   as [`PipelineError::Aggregate`].
//! - **Teardown**: dropping a cursor cancels everything beneath it;
//!   [`Cursor::close`] additionally waits for spawned drivers.

pub mod bridge;
pub mod cancel;
pub mod error;
pub mod executor;
pub mod id;
pub mod mode;
pub mod node;
pub mod nodes;
pub mod queue;
pub mod resequence;

pub use bridge::Subject;
pub use cancel::{DriverRegistry, ExecContext};
pub use error::{FaultCollector, PipelineError, PipelineResult};
pub use executor::{action, run_concurrently, run_in_parallel, run_scheduled, run_sequentially, Action, Emitter};
pub use id::{SeqCounter, SeqTag};
pub use mode::{ScheduleMode, Strategy};
pub use node::{Cursor, Flow, Operator};
pub use nodes::JoinKey;
pub use queue::{BufferPolicy, Overflow, QueueOptions, QueueReader, QueueWriter};
pub use resequence::Resequencer;
