//! Pipeline-specific error types and fault aggregation.

use std::fmt;
use thiserror::Error;

/// Errors that can occur while building or running a pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The consumer (or an external token) stopped the pipeline.
    #[error("Pipeline was cancelled")]
    Cancelled,

    /// The wrapped data source faulted mid-iteration.
    #[error("Source error: {0}")]
    Source(#[source] anyhow::Error),

    /// A per-item operation faulted.
    #[error("Action error: {0}")]
    Action(#[source] anyhow::Error),

    /// A per-item operation panicked.
    #[error("Action panicked: {0}")]
    Panicked(String),

    /// More than one fault was observed by a single driver.
    #[error("{} operations failed: {}", .0.len(), AggregateList(.0))]
    Aggregate(Vec<PipelineError>),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No tokio runtime available to drive the pipeline")]
    NoRuntime,

    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

struct AggregateList<'a>(&'a [PipelineError]);

impl fmt::Display for AggregateList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        f.write_str("]")
    }
}

impl PipelineError {
    /// Wrap any error as a source failure.
    pub fn upstream(err: impl Into<anyhow::Error>) -> Self {
        PipelineError::Source(err.into())
    }

    /// Wrap any error as an action failure.
    pub fn action(err: impl Into<anyhow::Error>) -> Self {
        PipelineError::Action(err.into())
    }

    /// Action failure from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        PipelineError::Action(anyhow::anyhow!("{message}"))
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for a requested unwind, looking through context wrappers.
    pub fn is_cancelled(&self) -> bool {
        match self {
            PipelineError::Cancelled => true,
            PipelineError::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, PipelineError::Aggregate(_))
    }

    /// The individual faults: the inner list for an aggregate, otherwise
    /// just this error.
    pub fn faults(&self) -> &[PipelineError] {
        match self {
            PipelineError::Aggregate(faults) => faults,
            other => std::slice::from_ref(other),
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Action(err)
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Collects every fault observed during one driver's lifetime.
///
/// Cancellation is a requested unwind, not a fault, and is never recorded.
#[derive(Debug, Default)]
pub struct FaultCollector {
    faults: Vec<PipelineError>,
}

impl FaultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault. Returns false if the error was a cancellation.
    pub fn record(&mut self, err: PipelineError) -> bool {
        if err.is_cancelled() {
            return false;
        }
        self.faults.push(err);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// Fold the collected faults into one outcome: `None` when nothing
    /// failed, the error itself when one did, an aggregate otherwise.
    pub fn finish(mut self) -> Option<PipelineError> {
        match self.faults.len() {
            0 => None,
            1 => self.faults.pop(),
            n => {
                tracing::warn!("Aggregating {} faults from one driver", n);
                Some(PipelineError::Aggregate(self.faults))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_fault_surfaces_as_is() {
        let mut faults = FaultCollector::new();
        faults.record(PipelineError::msg("boom"));
        let err = faults.finish().unwrap();
        assert!(!err.is_aggregate());
        assert_eq!(err.to_string(), "Action error: boom");
    }

    #[test]
    fn test_many_faults_aggregate() {
        let mut faults = FaultCollector::new();
        faults.record(PipelineError::msg("a"));
        faults.record(PipelineError::upstream(anyhow::anyhow!("b")));
        let err = faults.finish().unwrap();
        assert!(err.is_aggregate());
        assert_eq!(err.faults().len(), 2);
        assert_eq!(
            err.to_string(),
            "2 operations failed: [Action error: a; Source error: b]"
        );
    }

    #[test]
    fn test_cancellation_is_not_a_fault() {
        let mut faults = FaultCollector::new();
        assert!(!faults.record(PipelineError::Cancelled));
        assert!(!faults.record(PipelineError::Cancelled.with_context("inner")));
        assert!(faults.is_empty());
        assert!(faults.finish().is_none());
    }

    #[test]
    fn test_error_with_context() {
        let err = PipelineError::msg("test").with_context("Failed to map");
        assert!(err.to_string().contains("Failed to map"));
        assert!(!err.is_cancelled());
        assert_eq!(err.faults().len(), 1);
    }
}
