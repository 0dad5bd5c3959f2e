//! Router test harness: a migrated SQLite file and a local-filesystem media store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{Router, body::Body, http::Request, response::Response};
use http_body_util::BodyExt;
use pixfeed_core::storage::MediaBackend;
use pixfeed_db::{Migrator, UserRepository};
use pixfeed_shared::{JwtConfig, JwtService, MediaProvider, UploadConfig, UserId};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;

use crate::{AppState, create_router};

pub(crate) const BOUNDARY: &str = "pixfeed-test-boundary";

pub(crate) struct TestApp {
    pub state: AppState,
    dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let media_root = dir.path().join("media");
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(&media_root).unwrap();
        std::fs::create_dir_all(&staging).unwrap();

        let url = format!("sqlite://{}?mode=rwc", dir.path().join("pixfeed.db").display());
        let db = Database::connect(&url).await.expect("connect");
        Migrator::up(&db, None).await.expect("migrate");

        let media = MediaBackend::from_provider(&MediaProvider::LocalFs {
            root: media_root,
            public_url: "http://localhost:8000/media".to_string(),
        })
        .expect("media backend");

        let state = AppState {
            db: Arc::new(db),
            jwt_service: Arc::new(JwtService::new(JwtConfig {
                secret: "test-secret".to_string(),
                access_token_expires_secs: 3600,
            })),
            media: Arc::new(media),
            upload: UploadConfig {
                max_file_size: 64 * 1024,
                temp_dir: Some(staging),
            },
        };

        Self { state, dir }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub fn media_root(&self) -> PathBuf {
        self.dir.path().join("media")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    /// Insert a user directly and mint a token for them.
    pub async fn user(&self, email: &str) -> (UserId, String) {
        let user = UserRepository::new((*self.state.db).clone())
            .create(email, "$argon2id$not-used")
            .await
            .expect("create user");
        let token = self
            .state
            .jwt_service
            .generate_access_token(user.id, &user.email)
            .expect("token");
        (UserId::from_uuid(user.id), token)
    }
}

pub(crate) fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
}

pub(crate) async fn body_json(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).expect("json body")
}

/// One part of a hand-built multipart body.
pub(crate) enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub(crate) fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(crate) fn upload_request(token: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::post("/upload")
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub(crate) fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}
