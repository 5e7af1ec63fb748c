//! Error types for webrate.

use thiserror::Error;

use crate::ratelimit::StoreError;

/// Main error type for webrate operations.
#[derive(Error, Debug)]
pub enum WebrateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Counter store errors, passed through unmodified
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for webrate operations.
pub type Result<T> = std::result::Result<T, WebrateError>;
