//! Post service implementation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use pixfeed_shared::{PostId, UploadConfig, UserId};
use tokio::io::AsyncRead;
use tracing::{info, warn};

use super::error::PostError;
use super::types::{
    FeedEntry, FileType, NewPost, Post, SERVER_UPLOAD_TAGS, UNKNOWN_AUTHOR, UploadFile,
    UserSummary,
};
use crate::storage::{MediaStore, MediaUpload, StagedFile};

/// Repository trait for post persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
pub trait PostRepository: Send + Sync {
    /// Insert a post, commit, and return the row as stored.
    fn create(
        &self,
        post: NewPost,
    ) -> impl std::future::Future<Output = Result<Post, PostError>> + Send;

    /// All posts, newest first.
    fn list_newest_first(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Post>, PostError>> + Send;

    /// Find post by ID.
    fn find_by_id(
        &self,
        id: PostId,
    ) -> impl std::future::Future<Output = Result<Option<Post>, PostError>> + Send;

    /// Delete post by ID inside a transaction. Returns `false` if no row was removed.
    fn delete(&self, id: PostId)
    -> impl std::future::Future<Output = Result<bool, PostError>> + Send;
}

/// Read access to the user directory for author resolution.
pub trait UserDirectory: Send + Sync {
    /// Every known user.
    fn list_users(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<UserSummary>, PostError>> + Send;
}

/// An upload written to local disk, waiting to be published.
#[derive(Debug)]
pub struct StagedUpload {
    file: StagedFile,
    file_name: String,
    content_type: Option<String>,
}

impl StagedUpload {
    /// Bytes staged.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.file.size()
    }
}

/// Post service: upload, feed, delete.
pub struct PostService<R, U, M> {
    repo: Arc<R>,
    users: Arc<U>,
    media: Arc<M>,
    upload: UploadConfig,
}

impl<R, U, M> PostService<R, U, M>
where
    R: PostRepository,
    U: UserDirectory,
    M: MediaStore,
{
    /// Create a new post service.
    #[must_use]
    pub fn new(repo: Arc<R>, users: Arc<U>, media: Arc<M>, upload: UploadConfig) -> Self {
        Self {
            repo,
            users,
            media,
            upload,
        }
    }

    fn staging_dir(&self) -> PathBuf {
        self.upload
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Stage, upload, and persist a new post owned by `owner`.
    ///
    /// The staged temp file is removed on every path.
    ///
    /// # Errors
    ///
    /// Returns [`PostError::Storage`] if staging or the media upload fails and
    /// [`PostError::Repository`] if the insert fails.
    pub async fn upload<S>(
        &self,
        owner: UserId,
        file: UploadFile<S>,
        caption: String,
    ) -> Result<Post, PostError>
    where
        S: AsyncRead + Unpin + Send,
    {
        let staged = self.stage(file).await?;
        self.publish(owner, staged, caption).await
    }

    /// Write an upload stream to a temp file under the configured staging directory.
    ///
    /// Lets callers finish reading the rest of a request before publishing. Dropping
    /// the result removes the temp file.
    ///
    /// # Errors
    ///
    /// Returns [`PostError::Storage`] if the stream fails or exceeds the size limit.
    pub async fn stage<S>(&self, file: UploadFile<S>) -> Result<StagedUpload, PostError>
    where
        S: AsyncRead + Unpin + Send,
    {
        let file_staged = StagedFile::stage(
            file.reader,
            &self.staging_dir(),
            &file.file_name,
            self.upload.max_file_size,
        )
        .await?;

        Ok(StagedUpload {
            file: file_staged,
            file_name: file.file_name,
            content_type: file.content_type,
        })
    }

    /// Upload a staged file to the media store and persist the post.
    ///
    /// Consumes the staged upload; its temp file is removed whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PostError::Storage`] if the media upload fails and
    /// [`PostError::Repository`] if the insert fails.
    pub async fn publish(
        &self,
        owner: UserId,
        staged: StagedUpload,
        caption: String,
    ) -> Result<Post, PostError> {
        let StagedUpload {
            file,
            file_name,
            content_type,
        } = staged;

        let result = self
            .store_and_insert(owner, &file, file_name, content_type, caption)
            .await;
        file.cleanup().await;
        result
    }

    async fn store_and_insert(
        &self,
        owner: UserId,
        staged: &StagedFile,
        file_name: String,
        content_type: Option<String>,
        caption: String,
    ) -> Result<Post, PostError> {
        let data = staged.read().await?;
        let file_type = FileType::from_content_type(content_type.as_deref());

        let uploaded = self
            .media
            .upload(MediaUpload {
                data,
                file_name,
                content_type,
                use_unique_file_name: true,
                tags: SERVER_UPLOAD_TAGS.iter().map(ToString::to_string).collect(),
            })
            .await?;

        let post_id = PostId::new();
        let new_post = NewPost {
            id: post_id,
            user_id: owner,
            caption,
            url: uploaded.url,
            file_type,
            file_name: uploaded.name.clone(),
        };

        match self.repo.create(new_post).await {
            Ok(post) => {
                info!(
                    post_id = %post.id,
                    user_id = %owner,
                    file_type = %post.file_type,
                    size = staged.size(),
                    "Post created"
                );
                Ok(post)
            }
            Err(e) => {
                self.discard_orphaned_media(post_id, &uploaded.name).await;
                Err(e)
            }
        }
    }

    /// Remove an uploaded object after a failed insert, unless a row for it exists.
    async fn discard_orphaned_media(&self, post_id: PostId, name: &str) {
        match self.repo.find_by_id(post_id).await {
            Ok(None) => {
                if let Err(e) = self.media.delete(name).await {
                    warn!(file_name = %name, error = %e, "Failed to remove orphaned media");
                }
            }
            Ok(Some(_)) => {
                warn!(post_id = %post_id, file_name = %name, "Insert reported failure but row exists; keeping media");
            }
            Err(e) => {
                warn!(post_id = %post_id, file_name = %name, error = %e, "Cannot confirm insert outcome; keeping media");
            }
        }
    }

    /// All posts newest first, annotated for `requester`.
    ///
    /// # Errors
    ///
    /// Returns an error if either repository fails.
    pub async fn feed(&self, requester: UserId) -> Result<Vec<FeedEntry>, PostError> {
        let posts = self.repo.list_newest_first().await?;
        let emails: HashMap<UserId, String> = self
            .users
            .list_users()
            .await?
            .into_iter()
            .map(|user| (user.id, user.email))
            .collect();

        Ok(posts
            .into_iter()
            .map(|post| FeedEntry {
                is_owner: post.user_id == requester,
                user_email: emails
                    .get(&post.user_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
                post,
            })
            .collect())
    }

    /// Delete a post owned by `requester`.
    ///
    /// The remote object is removed first on a best-effort basis; its failure is logged
    /// and the row is deleted regardless.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `raw_id` is not a UUID
    /// - Post not found
    /// - Requester is not the owner
    /// - Database deletion fails
    pub async fn delete(&self, requester: UserId, raw_id: &str) -> Result<(), PostError> {
        let id: PostId = raw_id
            .parse()
            .map_err(|_| PostError::invalid_id(raw_id))?;

        let post = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(PostError::NotFound(id))?;

        if post.user_id != requester {
            return Err(PostError::Forbidden(id));
        }

        if let Err(e) = self.media.delete(&post.file_name).await {
            warn!(post_id = %id, file_name = %post.file_name, error = %e, "Remote media delete failed");
        }

        if !self.repo.delete(id).await? {
            return Err(PostError::NotFound(id));
        }

        info!(post_id = %id, user_id = %requester, "Post deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageError, UploadedMedia};
    use bytes::Bytes;
    use chrono::Utc;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Mock repository for testing.
    #[derive(Default)]
    struct MockPostRepository {
        posts: Mutex<HashMap<PostId, Post>>,
        fail_create: AtomicBool,
        fail_after_commit: AtomicBool,
        fail_delete: AtomicBool,
        delete_calls: AtomicUsize,
    }

    impl PostRepository for MockPostRepository {
        async fn create(&self, post: NewPost) -> Result<Post, PostError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(PostError::repository("insert failed"));
            }
            let post = Post {
                id: post.id,
                user_id: post.user_id,
                caption: post.caption,
                url: post.url,
                file_type: post.file_type,
                file_name: post.file_name,
                created_at: Utc::now(),
            };
            self.posts.lock().unwrap().insert(post.id, post.clone());
            if self.fail_after_commit.load(Ordering::SeqCst) {
                return Err(PostError::repository("connection reset during reload"));
            }
            Ok(post)
        }

        async fn list_newest_first(&self) -> Result<Vec<Post>, PostError> {
            let mut posts: Vec<Post> = self.posts.lock().unwrap().values().cloned().collect();
            posts.sort_by(|a, b| (b.created_at, b.id.0).cmp(&(a.created_at, a.id.0)));
            Ok(posts)
        }

        async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, PostError> {
            Ok(self.posts.lock().unwrap().get(&id).cloned())
        }

        async fn delete(&self, id: PostId) -> Result<bool, PostError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(PostError::repository("delete failed"));
            }
            Ok(self.posts.lock().unwrap().remove(&id).is_some())
        }
    }

    #[derive(Default)]
    struct MockUserDirectory {
        users: Vec<UserSummary>,
    }

    impl UserDirectory for MockUserDirectory {
        async fn list_users(&self) -> Result<Vec<UserSummary>, PostError> {
            Ok(self.users.clone())
        }
    }

    /// In-memory media store that records what it was asked to do.
    #[derive(Default)]
    struct FakeMediaStore {
        objects: Mutex<HashMap<String, Bytes>>,
        uploads: Mutex<Vec<MediaUpload>>,
        delete_calls: AtomicUsize,
        fail_upload: AtomicBool,
        fail_delete: AtomicBool,
    }

    impl MediaStore for FakeMediaStore {
        async fn upload(&self, upload: MediaUpload) -> Result<UploadedMedia, StorageError> {
            if self.fail_upload.load(Ordering::SeqCst) {
                return Err(StorageError::operation("media host unavailable"));
            }
            let name = format!("{}_{}", uuid::Uuid::new_v4().simple(), upload.file_name);
            self.objects
                .lock()
                .unwrap()
                .insert(name.clone(), upload.data.clone());
            self.uploads.lock().unwrap().push(upload);
            Ok(UploadedMedia {
                url: format!("https://media.test/{name}"),
                name,
            })
        }

        async fn delete(&self, name: &str) -> Result<(), StorageError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(StorageError::operation("media host unavailable"));
            }
            self.objects
                .lock()
                .unwrap()
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| StorageError::not_found(name))
        }
    }

    struct Fixture {
        service: PostService<MockPostRepository, MockUserDirectory, FakeMediaStore>,
        repo: Arc<MockPostRepository>,
        media: Arc<FakeMediaStore>,
        staging: TempDir,
        alice: UserId,
        bob: UserId,
    }

    fn fixture() -> Fixture {
        let alice = UserId::new();
        let bob = UserId::new();
        let staging = tempfile::tempdir().expect("temp dir");
        let repo = Arc::new(MockPostRepository::default());
        let media = Arc::new(FakeMediaStore::default());
        let users = Arc::new(MockUserDirectory {
            users: vec![
                UserSummary {
                    id: alice,
                    email: "alice@example.com".to_string(),
                },
                UserSummary {
                    id: bob,
                    email: "bob@example.com".to_string(),
                },
            ],
        });
        let upload = UploadConfig {
            max_file_size: 1024,
            temp_dir: Some(staging.path().to_path_buf()),
        };

        Fixture {
            service: PostService::new(repo.clone(), users, media.clone(), upload),
            repo,
            media,
            staging,
            alice,
            bob,
        }
    }

    fn png(bytes: &'static [u8]) -> UploadFile<&'static [u8]> {
        UploadFile {
            file_name: "cat.png".to_string(),
            content_type: Some("image/png".to_string()),
            reader: bytes,
        }
    }

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).expect("read dir").count()
    }

    #[tokio::test]
    async fn test_upload_persists_owned_post() {
        let f = fixture();

        let post = f
            .service
            .upload(f.alice, png(b"pixels"), "hi".to_string())
            .await
            .expect("upload");

        assert_eq!(post.user_id, f.alice);
        assert_eq!(post.caption, "hi");
        assert_eq!(post.file_type, FileType::Image);
        assert!(!post.url.is_empty());
        assert!(post.file_name.ends_with("cat.png"));
        assert_eq!(staged_files(f.staging.path()), 0);

        let uploads = f.media.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].use_unique_file_name);
        assert_eq!(uploads[0].tags, vec!["backend upload".to_string()]);
        assert_eq!(uploads[0].file_name, "cat.png");
        assert_eq!(uploads[0].data, Bytes::from_static(b"pixels"));
    }

    #[tokio::test]
    async fn test_stage_then_publish() {
        let f = fixture();

        let staged = f.service.stage(png(b"pixels")).await.expect("stage");
        assert_eq!(staged.size(), 6);
        assert_eq!(staged_files(f.staging.path()), 1);

        let post = f
            .service
            .publish(f.bob, staged, "late caption".to_string())
            .await
            .expect("publish");

        assert_eq!(post.user_id, f.bob);
        assert_eq!(post.caption, "late caption");
        assert_eq!(staged_files(f.staging.path()), 0);
    }

    #[tokio::test]
    async fn test_dropped_stage_leaves_nothing_behind() {
        let f = fixture();

        let staged = f.service.stage(png(b"pixels")).await.expect("stage");
        drop(staged);

        assert_eq!(staged_files(f.staging.path()), 0);
        assert!(f.media.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_video_content_type() {
        let f = fixture();
        let file = UploadFile {
            file_name: "clip.mp4".to_string(),
            content_type: Some("video/mp4".to_string()),
            reader: &b"frames"[..],
        };

        let post = f
            .service
            .upload(f.alice, file, String::new())
            .await
            .unwrap();
        assert_eq!(post.file_type, FileType::Video);
    }

    #[tokio::test]
    async fn test_upload_media_failure_leaves_nothing_behind() {
        let f = fixture();
        f.media.fail_upload.store(true, Ordering::SeqCst);

        let err = f
            .service
            .upload(f.alice, png(b"pixels"), String::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("media host unavailable"));
        assert!(f.repo.posts.lock().unwrap().is_empty());
        assert_eq!(staged_files(f.staging.path()), 0);
    }

    #[tokio::test]
    async fn test_upload_insert_failure_removes_remote_object() {
        let f = fixture();
        f.repo.fail_create.store(true, Ordering::SeqCst);

        let err = f
            .service
            .upload(f.alice, png(b"pixels"), String::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PostError::Repository(_)));
        assert!(f.media.objects.lock().unwrap().is_empty());
        assert_eq!(staged_files(f.staging.path()), 0);
    }

    #[tokio::test]
    async fn test_upload_error_after_commit_keeps_media() {
        let f = fixture();
        f.repo.fail_after_commit.store(true, Ordering::SeqCst);

        let err = f
            .service
            .upload(f.alice, png(b"pixels"), String::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PostError::Repository(_)));
        let rows: Vec<Post> = f.repo.posts.lock().unwrap().values().cloned().collect();
        assert_eq!(rows.len(), 1);
        let objects = f.media.objects.lock().unwrap();
        assert!(objects.contains_key(&rows[0].file_name));
        assert_eq!(f.media.delete_calls.load(Ordering::SeqCst), 0);
        assert_eq!(staged_files(f.staging.path()), 0);
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let f = fixture();
        let big: &'static [u8] = &[0u8; 2048];

        let err = f
            .service
            .upload(f.alice, png(big), String::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PostError::Storage(StorageError::FileTooLarge { max: 1024 })
        ));
        assert!(f.media.uploads.lock().unwrap().is_empty());
        assert_eq!(staged_files(f.staging.path()), 0);
    }

    #[tokio::test]
    async fn test_upload_broken_stream() {
        use futures::stream;
        use tokio_util::io::StreamReader;

        let f = fixture();
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            )),
        ];
        let file = UploadFile {
            file_name: "cat.png".to_string(),
            content_type: Some("image/png".to_string()),
            reader: StreamReader::new(stream::iter(chunks)),
        };

        let err = f
            .service
            .upload(f.alice, file, String::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("client went away"));
        assert_eq!(staged_files(f.staging.path()), 0);
    }

    #[tokio::test]
    async fn test_feed_annotates_owner_and_email() {
        let f = fixture();
        let first = f
            .service
            .upload(f.alice, png(b"a"), "first".to_string())
            .await
            .unwrap();
        let second = f
            .service
            .upload(f.bob, png(b"b"), "second".to_string())
            .await
            .unwrap();

        let feed = f.service.feed(f.alice).await.unwrap();

        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].post.id, second.id);
        assert_eq!(feed[1].post.id, first.id);
        assert!(feed[0].post.created_at >= feed[1].post.created_at);
        assert!(!feed[0].is_owner);
        assert!(feed[1].is_owner);
        assert_eq!(feed[0].user_email, "bob@example.com");
        assert_eq!(feed[1].user_email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_feed_unknown_author() {
        let f = fixture();
        let stranger = UserId::new();
        f.service
            .upload(stranger, png(b"a"), String::new())
            .await
            .unwrap();

        let feed = f.service.feed(f.alice).await.unwrap();
        assert_eq!(feed[0].user_email, UNKNOWN_AUTHOR);
    }

    #[tokio::test]
    async fn test_delete_malformed_id() {
        let f = fixture();
        let err = f.service.delete(f.alice, "not-a-uuid").await.unwrap_err();
        assert!(matches!(err, PostError::InvalidId(raw) if raw == "not-a-uuid"));
        assert_eq!(f.repo.delete_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.media.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_post() {
        let f = fixture();
        let id = PostId::new();

        let err = f
            .service
            .delete(f.alice, &id.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PostError::NotFound(missing) if missing == id));
        assert_eq!(f.repo.delete_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.media.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_by_non_owner_is_forbidden() {
        let f = fixture();
        let post = f
            .service
            .upload(f.alice, png(b"a"), String::new())
            .await
            .unwrap();

        let err = f
            .service
            .delete(f.bob, &post.id.to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, PostError::Forbidden(_)));
        assert_eq!(f.service.feed(f.bob).await.unwrap().len(), 1);
        assert_eq!(f.media.objects.lock().unwrap().len(), 1);
        assert_eq!(f.repo.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_by_owner() {
        let f = fixture();
        let post = f
            .service
            .upload(f.alice, png(b"a"), String::new())
            .await
            .unwrap();

        f.service
            .delete(f.alice, &post.id.to_string())
            .await
            .expect("delete");

        assert!(f.service.feed(f.alice).await.unwrap().is_empty());
        assert!(f.media.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_survives_remote_failure() {
        let f = fixture();
        let post = f
            .service
            .upload(f.alice, png(b"a"), String::new())
            .await
            .unwrap();
        f.media.fail_delete.store(true, Ordering::SeqCst);

        f.service
            .delete(f.alice, &post.id.to_string())
            .await
            .expect("row delete should still succeed");

        assert!(f.service.feed(f.alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_row_failure_is_repository_error() {
        let f = fixture();
        let post = f
            .service
            .upload(f.alice, png(b"a"), String::new())
            .await
            .unwrap();
        f.repo.fail_delete.store(true, Ordering::SeqCst);

        let err = f
            .service
            .delete(f.alice, &post.id.to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, PostError::Repository(_)));
        let feed = f.service.feed(f.alice).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post.id, post.id);
    }
}
