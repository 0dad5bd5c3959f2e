//! Posts: upload, feed assembly, and owner-scoped deletion.
//!
//! [`PostService`] owns the three request flows. Persistence and the user directory are
//! reached through [`PostRepository`] and [`UserDirectory`]; remote media through
//! [`MediaStore`](crate::storage::MediaStore).

mod error;
mod service;
mod types;

pub use error::PostError;
pub use service::{PostRepository, PostService, StagedUpload, UserDirectory};
pub use types::{
    FeedEntry, FileType, NewPost, Post, SERVER_UPLOAD_TAGS, UNKNOWN_AUTHOR, UploadFile,
    UserSummary,
};
