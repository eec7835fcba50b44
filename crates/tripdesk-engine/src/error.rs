//! # Engine Error Types
//!
//! Configuration failures. Desk operations return
//! [`tripdesk_core::CoreError`] directly; storage errors are already mapped
//! into it at the repository boundary.

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value failed validation after loading.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The config file could not be read or written.
    #[error("Config file error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No platform config directory and no explicit path.
    #[error("No config path available")]
    NoConfigPath,
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid(message.into())
    }
}
