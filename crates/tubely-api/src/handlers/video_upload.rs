use std::io;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tubely_core::{AppError, VideoResponse};
use tubely_processing::{IngestError, IngestRequest};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::HttpAppError;
use crate::state::AppState;

const VIDEO_FIELD: &str = "video";

/// Stream the `video` form field through the ingestion pipeline and return the
/// updated record.
#[tracing::instrument(skip(state, user, multipart), fields(user_id = %user.user_id))]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<VideoResponse>, HttpAppError> {
    let video_id = Uuid::parse_str(&video_id)?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let body = StreamReader::new(field.map_err(io::Error::other));

        let outcome = state
            .pipeline
            .ingest(IngestRequest {
                video_id,
                user_id: user.user_id,
                content_type,
                body,
            })
            .await
            .map_err(ingest_error)?;

        return Ok(Json(VideoResponse::from(outcome.video)));
    }

    Err(AppError::InvalidInput(format!("Missing '{}' field in form data", VIDEO_FIELD)).into())
}

/// Map a broken or oversized multipart body to a client error.
pub(super) fn multipart_error(err: MultipartError) -> HttpAppError {
    multipart_app_error(&err).into()
}

fn multipart_app_error(err: &MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::InvalidInput(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// A staging failure caused by the request body itself is the client's fault.
fn ingest_error(err: IngestError) -> HttpAppError {
    if let IngestError::Staging(io_err) = &err {
        if let Some(multipart_err) = io_err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
        {
            return multipart_app_error(multipart_err).into();
        }
    }
    err.into()
}
