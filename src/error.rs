//! Error handling for lazyflow-rs
//!
//! Pipeline execution reports [`PipelineError`]; everything around it
//! (configuration, files, logging setup) reports [`LazyFlowError`].

use crate::pipeline::error::PipelineError;
use thiserror::Error;

/// Main error type for lazyflow-rs operations
#[derive(Error, Debug)]
pub enum LazyFlowError {
    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Errors raised while running a pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<LazyFlowError>,
    },
}

impl LazyFlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        LazyFlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for LazyFlowError {
    fn from(err: serde_json::Error) -> Self {
        LazyFlowError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LazyFlowError {
    fn from(err: toml::de::Error) -> Self {
        LazyFlowError::Serialization(err.to_string())
    }
}

/// Result type alias for lazyflow-rs operations
pub type Result<T> = std::result::Result<T, LazyFlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| LazyFlowError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| LazyFlowError::from(e).with_context(f()))
    }
}
