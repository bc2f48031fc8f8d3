use std::sync::Arc;

use tubely_core::models::Video;
use tubely_db::VideoRepository;
use tubely_storage::{generate_storage_key, Storage};
use uuid::Uuid;

use super::error::IngestError;
use super::pipeline::remove_orphan;
use crate::validator::{extension_for_content_type, ContentTypeValidator, ValidationError};

const THUMBNAIL_FOLDER: &str = "thumbnails";

/// Stores a small image and points the video's `thumbnail_url` at it.
///
/// Unlike videos, thumbnails arrive fully buffered (the request layer bounds
/// their size) and need no probing or remuxing.
pub struct ThumbnailUploader {
    storage: Arc<dyn Storage>,
    videos: Arc<dyn VideoRepository>,
    validator: ContentTypeValidator,
    cleanup_orphaned_objects: bool,
}

impl ThumbnailUploader {
    pub fn new(
        storage: Arc<dyn Storage>,
        videos: Arc<dyn VideoRepository>,
        allowed_content_types: Vec<String>,
        cleanup_orphaned_objects: bool,
    ) -> Self {
        Self {
            storage,
            videos,
            validator: ContentTypeValidator::new(allowed_content_types),
            cleanup_orphaned_objects,
        }
    }

    #[tracing::instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn upload(
        &self,
        video_id: Uuid,
        user_id: Uuid,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Video, IngestError> {
        let content_type = self.validator.validate(content_type)?;
        let extension = extension_for_content_type(&content_type).ok_or_else(|| {
            ValidationError::InvalidContentType {
                content_type: content_type.clone(),
                allowed: self.validator.allowed().to_vec(),
            }
        })?;

        self.load_owned_video(video_id, user_id).await?;

        if data.is_empty() {
            return Err(ValidationError::EmptyFile.into());
        }

        let storage_key = generate_storage_key(THUMBNAIL_FOLDER, extension)?;
        let url = self
            .storage
            .upload_with_key(&storage_key, data, &content_type)
            .await?;

        let result = async {
            let mut video = self.load_owned_video(video_id, user_id).await?;
            video.thumbnail_url = Some(url);
            self.videos
                .update_video(&video)
                .await
                .map_err(IngestError::Persistence)
        }
        .await;

        match result {
            Ok(video) => {
                tracing::info!(video_id = %video_id, key = %storage_key, "Thumbnail uploaded");
                Ok(video)
            }
            Err(e) => {
                if self.cleanup_orphaned_objects {
                    remove_orphan(self.storage.as_ref(), &storage_key).await;
                }
                Err(e)
            }
        }
    }

    async fn load_owned_video(&self, video_id: Uuid, user_id: Uuid) -> Result<Video, IngestError> {
        let video = self
            .videos
            .get_video(video_id)
            .await
            .map_err(IngestError::Persistence)?
            .ok_or(IngestError::VideoNotFound(video_id))?;

        if !video.is_owned_by(user_id) {
            return Err(IngestError::NotOwner { video_id, user_id });
        }
        Ok(video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_video, InMemoryVideoRepository, MemoryStorage};

    fn uploader(
        storage: Arc<MemoryStorage>,
        videos: Arc<InMemoryVideoRepository>,
    ) -> ThumbnailUploader {
        ThumbnailUploader::new(
            storage,
            videos,
            vec!["image/jpeg".to_string(), "image/png".to_string()],
            true,
        )
    }

    #[tokio::test]
    async fn test_thumbnail_upload_links_url() {
        let storage = Arc::new(MemoryStorage::new());
        let videos = Arc::new(InMemoryVideoRepository::new());
        let video = sample_video(Uuid::new_v4());
        videos.insert(video.clone());

        let updated = uploader(storage.clone(), videos.clone())
            .upload(video.id, video.user_id, "image/png", b"\x89PNG".to_vec())
            .await
            .unwrap();

        let url = updated.thumbnail_url.unwrap();
        let keys = storage.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("thumbnails/") && keys[0].ends_with(".png"));
        assert!(url.ends_with(&keys[0]));
        assert_eq!(storage.content_type(&keys[0]).as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_thumbnail_rejects_gif() {
        let storage = Arc::new(MemoryStorage::new());
        let videos = Arc::new(InMemoryVideoRepository::new());
        let video = sample_video(Uuid::new_v4());
        videos.insert(video.clone());

        let err = uploader(storage.clone(), videos)
            .upload(video.id, video.user_id, "image/gif", b"GIF89a".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Validation(_)));
        assert_eq!(storage.upload_calls(), 0);
    }

    #[tokio::test]
    async fn test_thumbnail_rejects_other_users() {
        let storage = Arc::new(MemoryStorage::new());
        let videos = Arc::new(InMemoryVideoRepository::new());
        let video = sample_video(Uuid::new_v4());
        videos.insert(video.clone());

        let err = uploader(storage.clone(), videos.clone())
            .upload(video.id, Uuid::new_v4(), "image/jpeg", b"jpeg".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::NotOwner { .. }));
        assert_eq!(storage.upload_calls(), 0);
        assert_eq!(videos.get(video.id).unwrap().thumbnail_url, None);
    }

    #[tokio::test]
    async fn test_thumbnail_orphan_removed_when_update_fails() {
        let storage = Arc::new(MemoryStorage::new());
        let videos = Arc::new(InMemoryVideoRepository::new());
        let video = sample_video(Uuid::new_v4());
        videos.insert(video.clone());
        videos.fail_updates(true);

        let err = uploader(storage.clone(), videos)
            .upload(video.id, video.user_id, "image/jpeg", b"jpeg".to_vec())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Persistence(_)));
        assert_eq!(storage.upload_calls(), 1);
        assert!(storage.keys().is_empty());
    }
}
