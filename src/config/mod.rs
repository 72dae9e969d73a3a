//! Configuration module for lazyflow-rs
//!
//! Engine settings are plain values passed per iteration
//! (`Flow::iter_configured`); nothing here is global.
//!
//! # Files
//!
//! `EngineConfig::load` reads TOML (`.toml`) or JSON (`.json`), chosen by
//! extension. Missing fields take their defaults:
//!
//! ```toml
//! resequence_warn_threshold = 4096
//!
//! [bridge_queue]
//! multi_writer = false
//! policy = { kind = "bounded", capacity = 256, overflow = "drop_oldest" }
//!
//! [logging]
//! filter = "lazyflow_rs=debug"
//! ```

use crate::error::{LazyFlowError, Result};
use crate::pipeline::queue::QueueOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Buffered out-of-order results above which the re-sequencer logs a warning
pub const DEFAULT_RESEQUENCE_WARN_THRESHOLD: usize = 1024;

/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "lazyflow_rs=info";

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Engine-wide tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-subscriber queue of subjects built with `Subject::from_config`
    pub bridge_queue: QueueOptions,
    /// See [`DEFAULT_RESEQUENCE_WARN_THRESHOLD`]
    pub resequence_warn_threshold: usize,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bridge_queue: QueueOptions::unbounded(),
            resequence_warn_threshold: DEFAULT_RESEQUENCE_WARN_THRESHOLD,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LazyFlowError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| {
                LazyFlowError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                LazyFlowError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
            _ => {
                return Err(LazyFlowError::Config(format!(
                    "Unsupported config format {:?} (expected .toml or .json)",
                    path
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            LazyFlowError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.resequence_warn_threshold == 0 {
            return Err(LazyFlowError::Config(
                "resequence_warn_threshold must be at least 1".to_string(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(LazyFlowError::Config(
                "logging.filter must not be empty".to_string(),
            ));
        }
        self.bridge_queue
            .validate()
            .map_err(|e| LazyFlowError::Config(format!("bridge_queue: {}", e)))
    }
}
