//! Post routes: upload, feed, delete.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use pixfeed_core::post::{FeedEntry, FileType, Post, PostError, PostService, StagedUpload, UploadFile};
use pixfeed_core::storage::MediaBackend;
use pixfeed_db::{PostRepository, UserRepository};
use pixfeed_shared::{AppError, UploadConfig};
use serde::Serialize;
use serde_json::json;
use tokio_util::io::StreamReader;
use tracing::{error, info};
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::auth::AuthUser};

/// Multipart framing allowance on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Creates the posts router.
pub fn routes(upload: &UploadConfig) -> Router<AppState> {
    let body_limit = usize::try_from(upload.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(
            "/upload",
            post(upload_post).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/feed", get(feed))
        .route("/delete/{post_id}", delete(delete_post))
}

/// A created post.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    /// Post ID.
    pub id: Uuid,
    /// Owner.
    pub user_id: Uuid,
    /// Caption.
    pub caption: String,
    /// Public media URL.
    pub url: String,
    /// `image` or `video`.
    pub file_type: FileType,
    /// Media store object name.
    pub file_name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id.into_inner(),
            user_id: post.user_id.into_inner(),
            caption: post.caption,
            url: post.url,
            file_type: post.file_type,
            file_name: post.file_name,
            created_at: post.created_at,
        }
    }
}

/// A post in the feed, annotated for the requester.
#[derive(Debug, Serialize)]
pub struct FeedItemResponse {
    /// Post ID.
    pub id: Uuid,
    /// Caption.
    pub caption: String,
    /// Owner.
    pub user_id: Uuid,
    /// Public media URL.
    pub url: String,
    /// `image` or `video`.
    pub file_type: FileType,
    /// Media store object name.
    pub file_name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Whether the requester owns this post.
    pub is_owner: bool,
    /// Owner's email, `Unknown` if the owner is gone.
    pub user_email: String,
}

impl From<FeedEntry> for FeedItemResponse {
    fn from(entry: FeedEntry) -> Self {
        let FeedEntry {
            post,
            is_owner,
            user_email,
        } = entry;
        Self {
            id: post.id.into_inner(),
            caption: post.caption,
            user_id: post.user_id.into_inner(),
            url: post.url,
            file_type: post.file_type,
            file_name: post.file_name,
            created_at: post.created_at,
            is_owner,
            user_email,
        }
    }
}

/// Feed body.
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    /// Posts, newest first.
    pub posts: Vec<FeedItemResponse>,
}

/// Delete confirmation body.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    /// Always `true`.
    pub success: bool,
    /// Human-readable confirmation.
    pub message: &'static str,
}

type Service = PostService<PostRepository, UserRepository, MediaBackend>;

fn post_service(state: &AppState) -> Service {
    PostService::new(
        Arc::new(PostRepository::new((*state.db).clone())),
        Arc::new(UserRepository::new((*state.db).clone())),
        state.media.clone(),
        state.upload.clone(),
    )
}

fn bad_request(error: &str, message: impl Into<String>) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": error,
            "message": message.into()
        })),
    )
        .into_response()
}

fn missing_file() -> axum::response::Response {
    ApiError(AppError::Validation(
        "Missing required multipart file `file`".to_string(),
    ))
    .into_response()
}

/// POST /upload
/// Stage the `file` part, push it to the media store, and record the post.
async fn upload_post(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let service = post_service(&state);
    let mut caption = String::new();
    let mut staged: Option<StagedUpload> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    e.status(),
                    Json(json!({
                        "error": "invalid_multipart",
                        "message": e.body_text()
                    })),
                )
                    .into_response();
            }
        };

        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("file") if staged.is_none() => {
                let Some(file_name) = field.file_name().map(ToString::to_string) else {
                    return missing_file();
                };
                let file = UploadFile {
                    file_name,
                    content_type: field.content_type().map(ToString::to_string),
                    reader: StreamReader::new(Box::pin(field.map_err(std::io::Error::other))),
                };

                match service.stage(file).await {
                    Ok(upload) => staged = Some(upload),
                    Err(e) => {
                        error!(user_id = %auth.user_id(), error = %e, "Failed to stage upload");
                        return ApiError(AppError::from(e)).into_response();
                    }
                }
            }
            Some("caption") => match field.text().await {
                Ok(text) => caption = text,
                Err(e) => return bad_request("invalid_multipart", e.body_text()),
            },
            _ => {}
        }
    }

    let Some(staged) = staged else {
        return missing_file();
    };

    match service.publish(auth.user_id(), staged, caption).await {
        Ok(post) => (StatusCode::OK, Json(PostResponse::from(post))).into_response(),
        Err(e) => {
            error!(user_id = %auth.user_id(), error = %e, "Upload failed");
            ApiError(AppError::from(e)).into_response()
        }
    }
}

/// GET /feed
/// Every post, newest first, annotated for the requester.
async fn feed(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match post_service(&state).feed(auth.user_id()).await {
        Ok(entries) => (
            StatusCode::OK,
            Json(FeedResponse {
                posts: entries.into_iter().map(FeedItemResponse::from).collect(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to load feed");
            ApiError(AppError::from(e)).into_response()
        }
    }
}

/// DELETE `/delete/{post_id}`
/// Owner-only; the remote media object is removed on a best-effort basis.
async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<String>,
) -> impl IntoResponse {
    match post_service(&state).delete(auth.user_id(), &post_id).await {
        Ok(()) => (
                StatusCode::OK,
                Json(DeleteResponse {
                    success: true,
                    message: "Post deleted successfully",
                }),
            )
                .into_response(),
        Err(e @ (PostError::InvalidId(_) | PostError::NotFound(_) | PostError::Forbidden(_))) => {
            info!(post_id = %post_id, user_id = %auth.user_id(), reason = %e, "Delete refused");
            ApiError(AppError::from(e)).into_response()
        }
        Err(e) => {
            error!(post_id = %post_id, error = %e, "Failed to delete post");
            ApiError(AppError::from(e)).into_response()
        }
    }
}
