use crate::traits::{ByteReader, Storage, StorageError, StorageResult};
use crate::{validate_storage_key, StorageBackend};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncRead;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/tubely/assets")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:8091/assets")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert storage key to filesystem path under the base directory
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_storage_key(storage_key)?;
        Ok(self.base_path.join(storage_key))
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Partial writes go to a sibling file that is renamed into place once complete.
    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".partial");
        PathBuf::from(name)
    }

    /// Write `reader` to `<path>.partial` and rename it into place. On any
    /// failure the partial file is removed and nothing appears at `path`.
    async fn write_atomically<R>(&self, path: &Path, mut reader: R) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let partial = Self::partial_path(path);
        self.ensure_parent_dir(path).await?;

        let mut file = fs::File::create(&partial).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let copied = async {
            let bytes = tokio::io::copy(&mut reader, &mut file).await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;
        drop(file);

        let result = match copied {
            Ok(bytes) => fs::rename(&partial, path).await.map(|()| bytes).map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to finalize file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) => Err(StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            ))),
        };

        if result.is_err() {
            if let Err(e) = fs::remove_file(&partial).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %partial.display(), error = %e, "Failed to remove partial file");
                }
            }
        }

        result
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_stream(
        &self,
        storage_key: &str,
        _content_type: &str,
        _content_length: Option<u64>,
        reader: ByteReader,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        let bytes_copied = self.write_atomically(&path, reader).await.inspect_err(|e| {
            tracing::error!(
                error = %e,
                path = %path.display(),
                key = %storage_key,
                "Local storage stream upload failed"
            );
        })?;

        let url = self.generate_url(storage_key);

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream upload successful"
        );

        Ok(url)
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        self.write_atomically(&path, std::io::Cursor::new(data)).await?;

        let url = self.generate_url(storage_key);

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload_with_key successful"
        );

        Ok(url)
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn public_url(&self, storage_key: &str) -> String {
        self.generate_url(storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::tempdir;
    use tokio::io::{AsyncRead, ReadBuf};

    const BASE_URL: &str = "http://localhost:8091/assets";

    async fn storage_in(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, BASE_URL.to_string()).await.unwrap()
    }

    /// Yields some bytes, then fails.
    struct BrokenReader {
        sent: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.sent {
                Poll::Ready(Err(std::io::Error::other("client went away")))
            } else {
                self.sent = true;
                buf.put_slice(b"partial bytes");
                Poll::Ready(Ok(()))
            }
        }
    }

    #[tokio::test]
    async fn test_local_storage_stream_upload() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let data = b"stream test data".to_vec();
        let reader: ByteReader = Box::pin(std::io::Cursor::new(data.clone()));

        let url = storage
            .upload_stream(
                "landscape/abc.mp4",
                "video/mp4",
                Some(data.len() as u64),
                reader,
            )
            .await
            .unwrap();

        assert_eq!(url, format!("{}/landscape/abc.mp4", BASE_URL));
        let stored = std::fs::read(dir.path().join("landscape/abc.mp4")).unwrap();
        assert_eq!(stored, data);
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_no_object() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let reader: ByteReader = Box::pin(BrokenReader { sent: false });
        let result = storage
            .upload_stream("portrait/abc.mp4", "video/mp4", None, reader)
            .await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert!(!storage.exists("portrait/abc.mp4").await.unwrap());
        assert!(!dir.path().join("portrait/abc.mp4.partial").exists());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let result = storage
            .upload_with_key("../../../etc/passwd", b"x".to_vec(), "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let result = storage.delete("thumbnails/missing.png").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_upload_with_key_exists_and_delete() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;

        let url = storage
            .upload_with_key("thumbnails/aa.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();
        assert_eq!(url, storage.public_url("thumbnails/aa.png"));
        assert!(storage.exists("thumbnails/aa.png").await.unwrap());

        storage.delete("thumbnails/aa.png").await.unwrap();
        assert!(!storage.exists("thumbnails/aa.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_finalize_removes_partial_file() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        // A directory squatting on the final path makes the rename fail.
        std::fs::create_dir_all(dir.path().join("landscape/taken.mp4/inner")).unwrap();

        let reader: ByteReader = Box::pin(std::io::Cursor::new(b"video bytes".to_vec()));
        let result = storage
            .upload_stream("landscape/taken.mp4", "video/mp4", None, reader)
            .await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert!(!dir.path().join("landscape/taken.mp4.partial").exists());
        assert!(dir.path().join("landscape/taken.mp4").is_dir());
    }

    #[tokio::test]
    async fn test_upload_with_key_goes_through_partial_file() {
        let dir = tempdir().unwrap();
        let storage = storage_in(dir.path()).await;
        std::fs::create_dir_all(dir.path().join("thumbnails/taken.png/inner")).unwrap();

        let result = storage
            .upload_with_key("thumbnails/taken.png", b"png".to_vec(), "image/png")
            .await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert!(!dir.path().join("thumbnails/taken.png.partial").exists());

        storage
            .upload_with_key("thumbnails/ok.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("thumbnails/ok.png")).unwrap(), b"png");
        assert!(!dir.path().join("thumbnails/ok.png.partial").exists());
    }
}
