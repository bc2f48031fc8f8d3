//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;
use tubely_core::AppError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Owned byte source handed to `Storage::upload_stream`.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::KeyGeneration(msg) => AppError::Internal(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait, so the
/// ingestion pipeline never depends on a specific backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stream an object to `storage_key` and return its public URL.
    ///
    /// The reader is consumed until EOF without buffering the whole object.
    /// When this returns an error no complete object exists under the key.
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: ByteReader,
    ) -> StorageResult<String>;

    /// Upload a small in-memory payload to a specific key and return its public URL.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Deterministic public URL for a key.
    fn public_url(&self, storage_key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubely_core::ErrorMetadata;

    #[test]
    fn test_storage_error_maps_to_app_error() {
        let err: AppError = StorageError::UploadFailed("connection reset".into()).into();
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "STORAGE_ERROR");

        let err: AppError = StorageError::InvalidKey("../etc".into()).into();
        assert_eq!(err.http_status_code(), 400);

        let err: AppError = StorageError::KeyGeneration("no entropy".into()).into();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
