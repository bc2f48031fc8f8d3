use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use tubely_core::{AppError, VideoResponse};
use uuid::Uuid;

use super::video_upload::multipart_error;
use crate::auth::AuthUser;
use crate::error::HttpAppError;
use crate::state::AppState;

const THUMBNAIL_FIELD: &str = "thumbnail";

/// Store the `thumbnail` form field and point the video at it. The route's body
/// limit bounds how much is buffered here.
#[tracing::instrument(skip(state, user, multipart), fields(user_id = %user.user_id))]
pub async fn upload_thumbnail(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<VideoResponse>, HttpAppError> {
    let video_id = Uuid::parse_str(&video_id)?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(THUMBNAIL_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        let video = state
            .thumbnails
            .upload(video_id, user.user_id, &content_type, data.to_vec())
            .await?;

        return Ok(Json(VideoResponse::from(video)));
    }

    Err(AppError::InvalidInput(format!(
        "Missing '{}' field in form data",
        THUMBNAIL_FIELD
    ))
    .into())
}
