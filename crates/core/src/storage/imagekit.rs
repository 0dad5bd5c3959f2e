//! ImageKit media store client.
//!
//! Uploads go to `{upload_endpoint}/api/v1/files/upload` as multipart; deletes resolve
//! the stored name to a `fileId` through the file search API first, since posts only
//! keep the canonical name.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use super::backend::{MediaStore, MediaUpload, UploadedMedia};
use super::error::StorageError;

/// HTTP client for the ImageKit upload and management APIs.
#[derive(Clone)]
pub struct ImageKitClient {
    http: Client,
    private_key: String,
    upload_endpoint: String,
    api_endpoint: String,
}

impl std::fmt::Debug for ImageKitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageKitClient")
            .field("upload_endpoint", &self.upload_endpoint)
            .field("api_endpoint", &self.api_endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_id: String,
    name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileDetails {
    file_id: String,
    name: String,
}

impl ImageKitClient {
    /// Create a client for an ImageKit account.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key is empty or the HTTP client cannot be built.
    pub fn new(
        private_key: &str,
        upload_endpoint: &str,
        api_endpoint: &str,
    ) -> Result<Self, StorageError> {
        if private_key.trim().is_empty() {
            return Err(StorageError::configuration("imagekit private key is empty"));
        }

        let http = Client::builder()
            .user_agent(concat!("pixfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StorageError::configuration(e.to_string()))?;

        Ok(Self {
            http,
            private_key: private_key.to_string(),
            upload_endpoint: upload_endpoint.trim_end_matches('/').to_string(),
            api_endpoint: api_endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Look up the `fileId` of a stored file by its exact name.
    async fn find_file_id(&self, name: &str) -> Result<String, StorageError> {
        let response = self
            .http
            .get(format!("{}/v1/files", self.api_endpoint))
            .basic_auth(&self.private_key, Some(""))
            .query(&[("searchQuery", format!("name=\"{name}\""))])
            .send()
            .await?;

        let files: Vec<FileDetails> = ensure_success(response, "search").await?.json().await?;

        files
            .into_iter()
            .find(|file| file.name == name)
            .map(|file| file.file_id)
            .ok_or_else(|| StorageError::not_found(name))
    }
}

/// Turn a non-2xx response into an operation error carrying status and body.
async fn ensure_success(response: Response, action: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StorageError::operation(format!(
        "imagekit {action} failed with status {status}: {body}"
    )))
}

impl MediaStore for ImageKitClient {
    async fn upload(&self, upload: MediaUpload) -> Result<UploadedMedia, StorageError> {
        let mut file = Part::bytes(upload.data.to_vec()).file_name(upload.file_name.clone());
        if let Some(content_type) = upload.content_type.as_deref() {
            file = file
                .mime_str(content_type)
                .map_err(|e| StorageError::operation(e.to_string()))?;
        }

        let mut form = Form::new()
            .part("file", file)
            .text("fileName", upload.file_name)
            .text("useUniqueFileName", upload.use_unique_file_name.to_string());
        if !upload.tags.is_empty() {
            form = form.text("tags", upload.tags.join(","));
        }

        let response = self
            .http
            .post(format!("{}/api/v1/files/upload", self.upload_endpoint))
            .basic_auth(&self.private_key, Some(""))
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadResponse = ensure_success(response, "upload").await?.json().await?;
        debug!(file_id = %uploaded.file_id, name = %uploaded.name, "ImageKit upload complete");

        Ok(UploadedMedia {
            url: uploaded.url,
            name: uploaded.name,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let file_id = self.find_file_id(name).await?;

        let response = self
            .http
            .delete(format!("{}/v1/files/{file_id}", self.api_endpoint))
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await?;
        ensure_success(response, "delete").await?;

        debug!(file_id = %file_id, name = %name, "ImageKit file deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // base64("private_test:")
    const BASIC_AUTH: &str = "Basic cHJpdmF0ZV90ZXN0Og==";

    fn client(server: &MockServer) -> ImageKitClient {
        ImageKitClient::new("private_test", &server.uri(), &server.uri()).expect("client")
    }

    fn clip() -> MediaUpload {
        MediaUpload {
            data: Bytes::from_static(b"fake mp4 bytes"),
            file_name: "clip.mp4".to_string(),
            content_type: Some("video/mp4".to_string()),
            use_unique_file_name: true,
            tags: vec!["backend upload".to_string()],
        }
    }

    #[test]
    fn test_empty_private_key_rejected() {
        let err = ImageKitClient::new("  ", "https://u", "https://a").unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_upload_sends_options_and_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .and(header("authorization", BASIC_AUTH))
            .and(body_string_contains("useUniqueFileName"))
            .and(body_string_contains("backend upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fileId": "file_123",
                "name": "clip_AbC123.mp4",
                "url": "https://ik.imagekit.io/demo/clip_AbC123.mp4",
                "fileType": "non-image"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let uploaded = client(&server).upload(clip()).await.expect("upload");

        assert_eq!(uploaded.name, "clip_AbC123.mp4");
        assert_eq!(uploaded.url, "https://ik.imagekit.io/demo/clip_AbC123.mp4");
    }

    #[tokio::test]
    async fn test_upload_failure_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server).upload(clip()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("500"), "{message}");
        assert!(message.contains("boom"), "{message}");
    }

    #[tokio::test]
    async fn test_delete_resolves_file_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/files"))
            .and(query_param("searchQuery", "name=\"clip_AbC123.mp4\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "fileId": "file_123", "name": "clip_AbC123.mp4" }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/files/file_123"))
            .and(header("authorization", BASIC_AUTH))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .delete("clip_AbC123.mp4")
            .await
            .expect("delete");
    }

    #[tokio::test]
    async fn test_delete_unknown_name_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = client(&server).delete("missing.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
