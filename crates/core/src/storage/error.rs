//! Storage error types.

use thiserror::Error;

/// Media store and upload staging errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Upload exceeds the configured maximum.
    #[error("file size exceeds maximum allowed {max} bytes")]
    FileTooLarge {
        /// Maximum allowed size.
        max: u64,
    },

    /// Object not found in the media store.
    #[error("media object not found: {name}")]
    NotFound {
        /// Object name that was not found.
        name: String,
    },

    /// Staging the upload to a temporary file failed.
    #[error("failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),

    /// Storage provider configuration error.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// The media store rejected or failed the operation.
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Create a file too large error.
    #[must_use]
    pub fn file_too_large(max: u64) -> Self {
        Self::FileTooLarge { max }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an operation error.
    #[must_use]
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                name: err.to_string(),
            },
            _ => Self::Operation(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        Self::Operation(err.to_string())
    }
}
