//! Storage key derivation.
//!
//! Key format: `{folder}/{hex}.{ext}` where `hex` is 32 bytes from the OS
//! random source rendered as 64 lowercase hex characters.

use crate::traits::{StorageError, StorageResult};
use rand::rngs::OsRng;
use rand::TryRngCore;

const KEY_ENTROPY_BYTES: usize = 32;

/// Generate a fresh storage key under `folder` with extension `extension`.
///
/// Every call draws new entropy, so the same inputs never yield the same key.
pub fn generate_storage_key(folder: &str, extension: &str) -> StorageResult<String> {
    let mut bytes = [0u8; KEY_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| StorageError::KeyGeneration(e.to_string()))?;

    let key = format!("{}/{}.{}", folder, hex::encode(bytes), extension);
    validate_storage_key(&key)?;
    Ok(key)
}

/// Reject keys that could escape the bucket or storage root.
pub fn validate_storage_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_key_shape(key: &str, folder: &str, ext: &str) {
        let rest = key
            .strip_prefix(&format!("{}/", folder))
            .expect("folder prefix");
        let hex_part = rest.strip_suffix(&format!(".{}", ext)).expect("extension");
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_key_format() {
        let key = generate_storage_key("landscape", "mp4").unwrap();
        assert_key_shape(&key, "landscape", "mp4");

        let key = generate_storage_key("thumbnails", "png").unwrap();
        assert_key_shape(&key, "thumbnails", "png");
    }

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<String> = (0..256)
            .map(|_| generate_storage_key("portrait", "mp4").unwrap())
            .collect();
        assert_eq!(keys.len(), 256);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(validate_storage_key("").is_err());
        assert!(validate_storage_key("/landscape/a.mp4").is_err());
        assert!(validate_storage_key("landscape/../../etc/passwd").is_err());
        assert!(validate_storage_key("landscape/abc.mp4").is_ok());
    }

    #[test]
    fn test_traversal_folder_rejected() {
        let result = generate_storage_key("..", "mp4");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
