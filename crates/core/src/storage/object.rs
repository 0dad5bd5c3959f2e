//! Media store backed by Apache OpenDAL.

use std::path::Path;

use opendal::{ErrorKind, Operator, services};
use pixfeed_shared::MediaProvider;
use tracing::debug;
use uuid::Uuid;

use super::backend::{MediaStore, MediaUpload, UploadedMedia};
use super::error::StorageError;
use super::sanitize_filename;

/// Media store for S3-compatible buckets and the local filesystem.
pub struct ObjectMediaStore {
    operator: Operator,
    public_url: String,
    provider: &'static str,
}

impl std::fmt::Debug for ObjectMediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectMediaStore")
            .field("provider", &self.provider)
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

impl ObjectMediaStore {
    /// Create a store from provider config.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not an object store or the operator
    /// cannot be initialized.
    pub fn from_provider(provider: &MediaProvider) -> Result<Self, StorageError> {
        let (operator, public_url) = Self::create_operator(provider)?;
        Ok(Self {
            operator,
            public_url: public_url.trim_end_matches('/').to_string(),
            provider: provider.name(),
        })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &MediaProvider) -> Result<(Operator, &str), StorageError> {
        match provider {
            MediaProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
                public_url,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(|op| Ok((op, public_url.as_str())))
            }
            MediaProvider::LocalFs { root, public_url } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(|op| Ok((op, public_url.as_str())))
            }
            MediaProvider::Imagekit { .. } => Err(StorageError::configuration(
                "imagekit is not an object store provider",
            )),
        }
    }

    /// Build the stored object name for an uploaded file.
    ///
    /// Format: `{stem}_{uuid}.{ext}` when a unique name is requested, otherwise the
    /// sanitized filename.
    #[must_use]
    pub fn object_name(file_name: &str, unique: bool) -> String {
        let sanitized = sanitize_filename(file_name);
        if !unique {
            return sanitized;
        }

        let path = Path::new(&sanitized);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("file");
        let suffix = Uuid::new_v4().simple();

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{stem}_{suffix}.{ext}"),
            None => format!("{stem}_{suffix}"),
        }
    }

    /// Public URL an object name is served from.
    #[must_use]
    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.public_url, name)
    }

    /// Check if an object exists.
    pub async fn exists(&self, name: &str) -> bool {
        match self.operator.stat(name).await {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(_) => false,
        }
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider
    }
}

impl MediaStore for ObjectMediaStore {
    async fn upload(&self, upload: MediaUpload) -> Result<UploadedMedia, StorageError> {
        let name = Self::object_name(&upload.file_name, upload.use_unique_file_name);

        let write = self.operator.write_with(&name, upload.data);
        match upload.content_type.as_deref() {
            Some(content_type) => write.content_type(content_type).await?,
            None => write.await?,
        };

        // Object stores have no tag concept; tags only reach the log.
        debug!(name = %name, tags = ?upload.tags, "Object stored");

        Ok(UploadedMedia {
            url: self.url_for(&name),
            name,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.operator.delete(name).await.map_err(StorageError::from)
    }
}

/// Extension trait for pipe operator.
trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}
