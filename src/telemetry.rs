//! Logging setup.
//!
//! The library itself only emits `tracing` events. Binaries, tests and
//! benches that want to see them call [`init_tracing`] once.

use crate::config::LoggingConfig;
use crate::error::{LazyFlowError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global fmt subscriber. `RUST_LOG` wins over `config.filter`.
///
/// Fails instead of panicking when a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| LazyFlowError::Config(format!("Invalid log filter {:?}: {}", config.filter, e)))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| LazyFlowError::Config(format!("Failed to install tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        let config = LoggingConfig::default();
        // another test may have installed one already
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
