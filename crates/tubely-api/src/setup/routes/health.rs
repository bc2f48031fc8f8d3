//! Health check handlers

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Liveness probe - process is running.
pub async fn liveness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "storage": state.storage.backend_type(),
        })),
    )
}

/// Readiness probe - the object store answers.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = match tokio::time::timeout(
        CHECK_TIMEOUT,
        state.storage.exists("health-check-non-existent-key"),
    )
    .await
    {
        Ok(Ok(_)) => "ready".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Storage readiness check failed");
            format!("not_ready: {}", e)
        }
        Err(_) => {
            tracing::error!("Storage readiness check timed out");
            "timeout".to_string()
        }
    };

    let (status_code, status) = if storage == "ready" {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status_code,
        Json(serde_json::json!({ "status": status, "storage": storage })),
    )
}
