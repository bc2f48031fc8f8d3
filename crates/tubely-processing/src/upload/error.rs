use crate::validator::ValidationError;
use crate::video::MediaToolError;
use tubely_core::AppError;
use tubely_storage::StorageError;
use uuid::Uuid;

/// Why an ingestion (video or thumbnail) stopped.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Video {0} not found")]
    VideoNotFound(Uuid),

    #[error("Video {video_id} does not belong to user {user_id}")]
    NotOwner { video_id: Uuid, user_id: Uuid },

    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),

    #[error(transparent)]
    Processing(#[from] MediaToolError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Database lookup or update failed
    #[error("Persistence failed: {0}")]
    Persistence(#[source] AppError),
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(e) => e.into(),
            IngestError::VideoNotFound(_) => AppError::NotFound("Video not found".to_string()),
            IngestError::NotOwner { .. } => {
                AppError::Unauthorized("You are not the owner of this video".to_string())
            }
            IngestError::Staging(e) => AppError::Internal(format!("Failed to stage upload: {}", e)),
            IngestError::Processing(e) => e.into(),
            IngestError::Storage(e) => e.into(),
            IngestError::Persistence(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubely_core::ErrorMetadata;

    fn status(err: IngestError) -> u16 {
        AppError::from(err).http_status_code()
    }

    #[test]
    fn test_error_status_mapping() {
        let id = Uuid::new_v4();
        assert_eq!(
            status(IngestError::Validation(ValidationError::InvalidContentType {
                content_type: "image/gif".into(),
                allowed: vec!["video/mp4".into()],
            })),
            400
        );
        assert_eq!(
            status(IngestError::NotOwner {
                video_id: id,
                user_id: Uuid::new_v4()
            }),
            401
        );
        assert_eq!(status(IngestError::VideoNotFound(id)), 404);
        assert_eq!(status(IngestError::Processing(MediaToolError::ProbeEmpty)), 500);
        assert_eq!(
            status(IngestError::Storage(StorageError::UploadFailed("reset".into()))),
            500
        );
        assert_eq!(
            status(IngestError::Persistence(AppError::Internal("db".into()))),
            500
        );
        assert_eq!(
            status(IngestError::Staging(std::io::Error::other("disk full"))),
            500
        );
    }

    #[test]
    fn test_not_owner_message_hides_ids() {
        let err = AppError::from(IngestError::NotOwner {
            video_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        });
        assert_eq!(err.client_message(), "You are not the owner of this video");
    }
}
