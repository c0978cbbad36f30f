//! Shared error types for configuration loading

use thiserror::Error;

/// Errors from loading and validating configuration files.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias using the shared Error
pub type Result<T> = std::result::Result<T, Error>;
