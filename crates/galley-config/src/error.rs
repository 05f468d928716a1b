//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found")]
    NotFound,

    #[error("root directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("no entry points specified")]
    NoEntries,

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error(transparent)]
    Figment(#[from] figment::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
