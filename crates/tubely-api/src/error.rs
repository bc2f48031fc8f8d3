//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpAppError>`. Anything that converts into
//! `AppError` (ingestion, storage and validation errors) renders with the same
//! status mapping, body shape and log level.
//!
//! The body is always safe to show to clients. For non-sensitive errors the
//! full detail travels along as a response extension, and
//! [`expose_error_details`] writes it into the body outside production.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tubely_core::{AppError, ErrorMetadata, LogLevel};
use tubely_processing::IngestError;
use tubely_storage::StorageError;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
}

impl ErrorResponse {
    fn from_app_error(app_error: &AppError) -> Self {
        Self {
            error: app_error.client_message(),
            details: None,
            error_type: None,
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
        }
    }
}

/// Detailed variant of an error body, attached to non-sensitive error responses.
#[derive(Debug, Clone)]
pub struct DetailedError(pub ErrorResponse);

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rules: `AppError` lives in tubely-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<IngestError> for HttpAppError {
    fn from(err: IngestError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<uuid::Error> for HttpAppError {
    fn from(err: uuid::Error) -> Self {
        HttpAppError(err.into())
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = ErrorResponse::from_app_error(app_error);
        let detailed = (!app_error.is_sensitive()).then(|| ErrorResponse {
            details: Some(app_error.detailed_message()),
            error_type: Some(app_error.error_type().to_string()),
            ..body.clone()
        });

        let mut response = (status, Json(body)).into_response();
        if let Some(detailed) = detailed {
            response.extensions_mut().insert(DetailedError(detailed));
        }
        response
    }
}

/// Replace error bodies with their detailed variant. Installed only outside production.
pub async fn expose_error_details(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(DetailedError(detailed)) = response.extensions_mut().remove::<DetailedError>() else {
        return response;
    };

    let Ok(bytes) = serde_json::to_vec(&detailed) else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubely_processing::ValidationError;
    use uuid::Uuid;

    fn status_of(err: impl Into<HttpAppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_ingest_errors_map_to_status_codes() {
        let video_id = Uuid::new_v4();
        assert_eq!(
            status_of(IngestError::Validation(ValidationError::InvalidContentType {
                content_type: "image/gif".into(),
                allowed: vec!["video/mp4".into()],
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(IngestError::NotOwner {
                video_id,
                user_id: Uuid::new_v4(),
            }),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(IngestError::VideoNotFound(video_id)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StorageError::UploadFailed("connection reset".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sensitive_errors_carry_no_details() {
        let response =
            HttpAppError(AppError::Storage("bucket tubely-media unreachable".into())).into_response();
        assert!(response.extensions().get::<DetailedError>().is_none());
    }

    #[test]
    fn test_client_errors_carry_details() {
        let response = HttpAppError(AppError::NotFound("Video not found".into())).into_response();
        let DetailedError(detailed) = response
            .extensions()
            .get::<DetailedError>()
            .cloned()
            .expect("details attached");
        assert_eq!(detailed.error_type.as_deref(), Some("NotFound"));
        assert_eq!(detailed.code, "NOT_FOUND");
        assert!(detailed.details.unwrap().contains("Video not found"));
    }

    /// Public error response contract: "error", "code" and "recoverable" are
    /// always present; "details" and "error_type" only when set.
    #[test]
    fn test_error_response_shape() {
        let response = ErrorResponse::from_app_error(&AppError::PayloadTooLarge("too big".into()));
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["error"], "too big");
        assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(json["recoverable"], false);
        assert!(json.get("details").is_none());
        assert!(json.get("error_type").is_none());
    }
}
