//! Temp-file staging of upload streams.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::warn;

use super::error::StorageError;
use super::sanitize_filename;

const TEMP_PREFIX: &str = "pixfeed-";

/// An upload written to a uniquely named temporary file.
///
/// The file keeps the original filename's extension. Dropping the value removes the
/// file; [`StagedFile::cleanup`] does the same but reports failures to the log.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    size: u64,
}

impl StagedFile {
    /// Stream `reader` into a new temp file under `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileTooLarge`] when the stream exceeds `max_size` bytes and
    /// [`StorageError::Staging`] on I/O failures. The partial file is removed in both cases.
    pub async fn stage<R>(
        reader: R,
        dir: &Path,
        original_filename: &str,
        max_size: u64,
    ) -> Result<Self, StorageError>
    where
        R: AsyncRead + Unpin,
    {
        let suffix = extension_suffix(original_filename);
        let (file, path) = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&suffix)
            .tempfile_in(dir)?
            .into_parts();

        let mut file = tokio::fs::File::from_std(file);
        let mut limited = reader.take(max_size.saturating_add(1));
        let size = tokio::io::copy(&mut limited, &mut file).await?;
        file.flush().await?;

        if size > max_size {
            return Err(StorageError::file_too_large(max_size));
        }

        Ok(Self { path, size })
    }

    /// Location of the staged file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes staged.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read the staged bytes back.
    pub async fn read(&self) -> Result<Bytes, StorageError> {
        Ok(Bytes::from(tokio::fs::read(&self.path).await?))
    }

    /// Remove the temp file. Failures are logged, never returned.
    pub async fn cleanup(self) {
        // Take the path out of the drop guard so removal goes through tokio.
        let path: PathBuf = match self.path.keep() {
            Ok(path) => path,
            Err(e) => {
                warn!(path = %e.path.display(), error = %e.error, "Failed to release staged upload");
                return;
            }
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staged upload"),
        }
    }
}

/// `.ext` of the sanitized filename, or empty when there is none.
fn extension_suffix(filename: &str) -> String {
    Path::new(&sanitize_filename(filename))
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}
