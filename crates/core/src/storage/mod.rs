//! Media storage for uploaded posts.
//!
//! This module provides:
//! - The [`MediaStore`] seam the post service uploads through
//! - An ImageKit backend for the hosted media service
//! - An Apache OpenDAL backend for S3-compatible buckets and the local filesystem
//! - Temp-file staging of incoming upload streams
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        MediaBackend                           │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │ ImageKitClient (reqwest)     │ ObjectMediaStore (OpenDAL)    │
//! │ POST /api/v1/files/upload    │ op.write("name", data)        │
//! │ DELETE /v1/files/{fileId}    │ op.delete("name")             │
//! └──────────────────────────────┴───────────────────────────────┘
//! ```

mod backend;
mod error;
mod imagekit;
mod object;
mod staging;

pub use backend::{MediaBackend, MediaStore, MediaUpload, UploadedMedia};
pub use error::StorageError;
pub use imagekit::ImageKitClient;
pub use object::ObjectMediaStore;
pub use staging::StagedFile;

/// Sanitize a filename for use in object names and temp-file suffixes.
///
/// Only allows ASCII alphanumeric characters, dots, hyphens, and underscores.
pub(crate) fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
