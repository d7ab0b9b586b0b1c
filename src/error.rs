use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by token-guard.
#[derive(Error, Debug)]
pub enum GuardError {
    /// The wrapped command could not be started.
    #[error("Failed to start command '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The resolved options cannot drive a run.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// A config file exists but could not be used.
    #[error("Invalid config file {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// The log subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for token-guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;
