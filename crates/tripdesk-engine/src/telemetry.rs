//! # Tracing Setup
//!
//! `RUST_LOG` wins over the configured filter string, matching the usual
//! `tracing_subscriber` convention.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;
use crate::error::{ConfigError, ConfigResult};

/// Builds the filter from `RUST_LOG`, falling back to `settings.filter`.
pub fn build_filter(settings: &LoggingSettings) -> ConfigResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.filter).map_err(|e| {
            ConfigError::invalid(format!("logging.filter '{}': {}", settings.filter, e))
        }),
    }
}

/// Installs the global fmt subscriber. Calling it twice is harmless: the
/// second call keeps the first subscriber.
pub fn init_tracing(settings: &LoggingSettings) -> ConfigResult<()> {
    let filter = build_filter(settings)?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(settings.with_target)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = %settings.filter, "Tracing initialized");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_filter_parses() {
        let settings = LoggingSettings::default();
        assert!(EnvFilter::try_new(&settings.filter).is_ok());
    }

    #[test]
    fn test_init_twice_is_ok() {
        let settings = LoggingSettings::default();
        init_tracing(&settings).unwrap();
        init_tracing(&settings).unwrap();
    }
}
