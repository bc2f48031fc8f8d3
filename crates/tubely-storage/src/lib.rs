//! Tubely Storage Library
//!
//! Storage abstraction and the S3 and local filesystem backends.
//!
//! # Storage key format
//!
//! Keys are `{folder}/{64 hex chars}.{ext}`. Uploaded videos use the orientation
//! folder (`landscape`, `portrait`, `other`) and thumbnails use `thumbnails`.
//! Keys must not contain `..` or a leading `/`. Key generation lives in the
//! `keys` module so every caller derives keys the same way.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::{generate_storage_key, validate_storage_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteReader, Storage, StorageError, StorageResult};
pub use tubely_core::StorageBackend;
