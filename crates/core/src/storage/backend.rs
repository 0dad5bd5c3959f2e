//! The media store seam and the configured backend.

use std::future::Future;

use bytes::Bytes;
use pixfeed_shared::MediaProvider;

use super::error::StorageError;
use super::imagekit::ImageKitClient;
use super::object::ObjectMediaStore;

/// A file handed to the media store.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    /// File contents.
    pub data: Bytes,
    /// Original filename as sent by the client.
    pub file_name: String,
    /// MIME type, when known.
    pub content_type: Option<String>,
    /// Ask the store to make the object name unique.
    pub use_unique_file_name: bool,
    /// Tags attached to the stored object.
    pub tags: Vec<String>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    /// Public URL the object is served from.
    pub url: String,
    /// Canonical object name, used later to delete the object.
    pub name: String,
}

/// Remote media storage.
///
/// Implemented by the hosted ImageKit client and the OpenDAL object store. The post
/// service only ever talks to this trait.
pub trait MediaStore: Send + Sync {
    /// Store a file and return where it lives.
    fn upload(
        &self,
        upload: MediaUpload,
    ) -> impl Future<Output = Result<UploadedMedia, StorageError>> + Send;

    /// Delete a stored object by its canonical name.
    fn delete(&self, name: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// The media store selected by configuration.
#[derive(Debug)]
pub enum MediaBackend {
    /// Hosted ImageKit account.
    ImageKit(ImageKitClient),
    /// OpenDAL operator (S3-compatible or local filesystem).
    Object(ObjectMediaStore),
}

impl MediaBackend {
    /// Build the backend for a provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be initialized.
    pub fn from_provider(provider: &MediaProvider) -> Result<Self, StorageError> {
        match provider {
            MediaProvider::Imagekit {
                private_key,
                upload_endpoint,
                api_endpoint,
            } => ImageKitClient::new(private_key, upload_endpoint, api_endpoint).map(Self::ImageKit),
            MediaProvider::S3 { .. } | MediaProvider::LocalFs { .. } => {
                ObjectMediaStore::from_provider(provider).map(Self::Object)
            }
        }
    }

    /// Get the provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::ImageKit(_) => "imagekit",
            Self::Object(store) => store.provider_name(),
        }
    }
}

impl MediaStore for MediaBackend {
    async fn upload(&self, upload: MediaUpload) -> Result<UploadedMedia, StorageError> {
        match self {
            Self::ImageKit(client) => client.upload(upload).await,
            Self::Object(store) => store.upload(upload).await,
        }
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        match self {
            Self::ImageKit(client) => client.delete(name).await,
            Self::Object(store) => store.delete(name).await,
        }
    }
}
