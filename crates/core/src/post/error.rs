//! Post error types.

use pixfeed_shared::{AppError, PostId};
use thiserror::Error;

use crate::storage::StorageError;

/// Post operation errors.
#[derive(Debug, Error)]
pub enum PostError {
    /// Post ID is not a valid UUID.
    #[error("invalid post id: {0}")]
    InvalidId(String),

    /// Post not found.
    #[error("post not found: {0}")]
    NotFound(PostId),

    /// Requester does not own the post.
    #[error("not allowed to delete post {0}")]
    Forbidden(PostId),

    /// Staging or media store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl PostError {
    /// Create an invalid id error.
    #[must_use]
    pub fn invalid_id(raw: impl Into<String>) -> Self {
        Self::InvalidId(raw.into())
    }

    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }
}

impl From<PostError> for AppError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::InvalidId(_) => Self::Validation(err.to_string()),
            PostError::NotFound(_) => Self::NotFound(err.to_string()),
            PostError::Forbidden(_) => Self::Forbidden(err.to_string()),
            PostError::Storage(_) | PostError::Repository(_) => Self::Internal(err.to_string()),
        }
    }
}
