//! Post domain types.

use chrono::{DateTime, Utc};
use pixfeed_shared::{PostId, UserId};
use serde::{Deserialize, Serialize};

/// Author shown in the feed when the owner is missing from the user directory.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Tags attached to every object this server uploads.
pub const SERVER_UPLOAD_TAGS: [&str; 1] = ["backend upload"];

/// Kind of media a post carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Still image.
    Image,
    /// Video clip.
    Video,
}

impl FileType {
    /// Classify an upload by its content type: `video*` is a video, anything else an image.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.starts_with("video") => Self::Video,
            _ => Self::Image,
        }
    }

    /// Stored and serialized form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Parse the stored form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Post ID.
    pub id: PostId,
    /// Owner.
    pub user_id: UserId,
    /// Caption, empty when none was given.
    pub caption: String,
    /// Public media URL.
    pub url: String,
    /// Media kind.
    pub file_type: FileType,
    /// Media store object name; also the remote delete key.
    pub file_name: String,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// Row to insert after a successful media upload.
#[derive(Debug, Clone)]
pub struct NewPost {
    /// Post ID.
    pub id: PostId,
    /// Owner.
    pub user_id: UserId,
    /// Caption.
    pub caption: String,
    /// Public media URL.
    pub url: String,
    /// Media kind.
    pub file_type: FileType,
    /// Media store object name.
    pub file_name: String,
}

/// An incoming upload stream with its client-supplied metadata.
#[derive(Debug)]
pub struct UploadFile<R> {
    /// Filename from the multipart part.
    pub file_name: String,
    /// Content type from the multipart part.
    pub content_type: Option<String>,
    /// File body.
    pub reader: R,
}

/// A post as seen by a particular requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// The post.
    pub post: Post,
    /// Whether the requester owns the post.
    pub is_owner: bool,
    /// Owner's email, or [`UNKNOWN_AUTHOR`].
    pub user_email: String,
}

/// Directory entry used to resolve post authors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    /// User ID.
    pub id: UserId,
    /// Email.
    pub email: String,
}
