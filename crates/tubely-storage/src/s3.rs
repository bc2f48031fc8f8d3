use crate::traits::{ByteReader, Storage, StorageError, StorageResult};
use crate::{validate_storage_key, StorageBackend};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, ObjectStoreExt, PutMultipartOptions,
    PutOptions, PutPayload, Result as ObjectResult, RetryConfig, WriteMultipart,
};
use tokio::io::AsyncReadExt;

/// Size of each multipart part. S3 requires at least 5 MiB for all but the last part.
const PART_SIZE: usize = 8 * 1024 * 1024;
/// Parts allowed in flight while streaming.
const MAX_CONCURRENT_PARTS: usize = 4;
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `max_retries` - transport-level retries performed by the S3 client
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        max_retries: usize,
    ) -> StorageResult<Self> {
        // Credentials come from the standard AWS environment variables.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone())
            .with_retry(RetryConfig {
                max_retries,
                ..Default::default()
            });

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
        })
    }

    /// Generate public URL for S3 object
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses path-style: {endpoint}/{bucket}/{key}
    fn generate_url(&self, key: &str) -> String {
        s3_object_url(
            &self.bucket,
            &self.region,
            self.endpoint_url.as_deref(),
            key,
        )
    }

    fn content_type_attributes(content_type: &str) -> Attributes {
        Attributes::from_iter([(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        )])
    }

    /// Copy the reader into an open multipart upload. Returns the number of bytes sent.
    async fn write_parts(
        upload: &mut WriteMultipart,
        reader: &mut ByteReader,
    ) -> Result<u64, StorageError> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut total: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
            })?;
            if n == 0 {
                break;
            }

            upload
                .wait_for_capacity(MAX_CONCURRENT_PARTS)
                .await
                .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
            upload.write(&buf[..n]);
            total += n as u64;
        }

        Ok(total)
    }
}

pub(crate) fn s3_object_url(
    bucket: &str,
    region: &str,
    endpoint_url: Option<&str>,
    key: &str,
) -> String {
    match endpoint_url {
        Some(endpoint) => {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, bucket, key)
        }
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: Option<u64>,
        mut reader: ByteReader,
    ) -> StorageResult<String> {
        validate_storage_key(storage_key)?;
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let opts = PutMultipartOptions {
            attributes: Self::content_type_attributes(content_type),
            ..Default::default()
        };
        let multipart = self
            .store
            .put_multipart_opts(&location, opts)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "S3 multipart upload could not be started"
                );
                StorageError::UploadFailed(e.to_string())
            })?;
        let mut upload = WriteMultipart::new_with_chunk_size(multipart, PART_SIZE);

        let size = match Self::write_parts(&mut upload, &mut reader).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(abort_err) = upload.abort().await {
                    tracing::warn!(
                        error = %abort_err,
                        bucket = %self.bucket,
                        key = %storage_key,
                        "Failed to abort S3 multipart upload"
                    );
                }
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream upload failed"
                );
                return Err(e);
            }
        };

        // finish() aborts the multipart upload itself when completion fails
        let result: ObjectResult<_> = upload.finish().await;
        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 stream upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        if let Some(expected) = content_length {
            if expected != size {
                tracing::warn!(
                    key = %storage_key,
                    expected_bytes = expected,
                    size_bytes = size,
                    "Uploaded size differs from declared content length"
                );
            }
        }

        let url = self.generate_url(storage_key);

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stream upload successful"
        );

        Ok(url)
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        validate_storage_key(storage_key)?;
        let size = data.len() as u64;
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let opts = PutOptions {
            attributes: Self::content_type_attributes(content_type),
            ..Default::default()
        };
        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(Bytes::from(data)), opts)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload_with_key failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        let url = self.generate_url(storage_key);

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload_with_key successful"
        );

        Ok(url)
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_storage_key(storage_key)?;
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_storage_key(storage_key)?;
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn public_url(&self, storage_key: &str) -> String {
        self.generate_url(storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aws_url_format() {
        let url = s3_object_url(
            "tubely-media",
            "us-east-2",
            None,
            "landscape/0123abcd.mp4",
        );
        assert_eq!(
            url,
            "https://tubely-media.s3.us-east-2.amazonaws.com/landscape/0123abcd.mp4"
        );
    }

    #[test]
    fn test_custom_endpoint_url_format() {
        let url = s3_object_url(
            "tubely-media",
            "us-east-1",
            Some("http://localhost:9000/"),
            "portrait/ff.mp4",
        );
        assert_eq!(url, "http://localhost:9000/tubely-media/portrait/ff.mp4");
    }

    #[tokio::test]
    async fn test_public_url_from_storage() {
        let storage = S3Storage::new(
            "tubely-media".to_string(),
            "us-east-2".to_string(),
            None,
            0,
        )
        .await
        .unwrap();
        assert_eq!(
            storage.public_url("other/aa.mp4"),
            "https://tubely-media.s3.us-east-2.amazonaws.com/other/aa.mp4"
        );
        assert_eq!(storage.backend_type(), StorageBackend::S3);
    }
}
