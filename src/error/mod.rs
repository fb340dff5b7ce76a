//! Error handling module for ReelCut

use thiserror::Error;

use crate::domain::errors::{DomainError, EditError};

/// Main error type for ReelCut operations
#[derive(Error, Debug)]
pub enum ReelError {
    /// A port or use case failed
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An editing operation was rejected
    #[error("Edit rejected: {0}")]
    Edit(#[from] EditError),

    /// Invalid time format
    #[error("Invalid time format: {time}. Expected HH:MM:SS.ms, MM:SS.ms, or seconds")]
    InvalidTimeFormat { time: String },

    /// Unknown editing command on the command line
    #[error("Unknown edit operation: {op}")]
    UnknownOperation { op: String },

    /// Draft id not present in the store
    #[error("Draft not found: {id}")]
    DraftNotFound { id: String },

    /// Configuration file or value rejected
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for ReelCut operations
pub type ReelResult<T> = std::result::Result<T, ReelError>;
