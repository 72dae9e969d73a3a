//! # lazyflow-rs: lazy asynchronous pipelines
//!
//! LINQ-style operators over asynchronous data sources. Each operator wraps
//! its parent in a new immutable node; nothing executes until a consumer
//! opens a cursor and starts pulling.
//!
//! ## Architecture
//!
//! - **Pipeline**: operator nodes, schedule modes and the execution engine
//!   that runs a stage sequentially, concurrently or in parallel
//! - **Bridge**: `Subject` turns pushed events into a pull-based flow
//! - **Config**: per-call engine tunables loaded from TOML or JSON
//! - **Telemetry**: `tracing` subscriber setup
//!
//! ## Example
//!
//! ```no_run
//! use lazyflow_rs::Flow;
//! use std::time::Duration;
//!
//! # async fn demo() -> lazyflow_rs::PipelineResult<()> {
//! let delays = Flow::from_iter(vec![300u64, 200, 100])
//!     .as_concurrent(false)
//!     .then(|ms| async move {
//!         tokio::time::sleep(Duration::from_millis(ms)).await;
//!         Ok(ms)
//!     });
//!
//! // completion order
//! assert_eq!(delays.to_vec().await?, vec![100, 200, 300]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;

// Re-export commonly used types
pub use config::{EngineConfig, LoggingConfig};
pub use error::{LazyFlowError, Result, ResultExt};
pub use pipeline::{Cursor, Flow, JoinKey, Operator, PipelineError, PipelineResult, ScheduleMode, Subject};
