//! Route configuration and setup.

mod health;

use crate::auth::middleware::{auth_middleware, AuthState};
use crate::error::expose_error_details;
use crate::handlers::{thumbnail_upload::upload_thumbnail, video_upload::upload_video};
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the full router: public health checks, authenticated upload routes
/// with their own body limits, tracing and request IDs.
pub fn build_router(state: Arc<AppState>) -> Router {
    let config = &state.config;
    let auth_state = Arc::new(AuthState::new(config.jwt_secret()));

    let video_routes = Router::new()
        .route("/api/videos/{video_id}/upload", post(upload_video))
        .layer(DefaultBodyLimit::max(config.max_video_size_bytes()));
    let thumbnail_routes = Router::new()
        .route("/api/thumbnail_upload/{video_id}", post(upload_thumbnail))
        .layer(DefaultBodyLimit::max(config.max_thumbnail_size_bytes()));

    let protected_routes = video_routes
        .merge(thumbnail_routes)
        .layer(axum::middleware::from_fn_with_state(auth_state, auth_middleware));

    let public_routes = Router::new()
        .route("/health", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check));

    let mut app = public_routes.merge(protected_routes);
    if !config.is_production() {
        app = app.layer(axum::middleware::from_fn(expose_error_details));
    }

    tracing::info!(
        max_video_bytes = config.max_video_size_bytes(),
        max_thumbnail_bytes = config.max_thumbnail_size_bytes(),
        production = config.is_production(),
        "Routes configured"
    );

    app.layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
