use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tubely_core::AppError;

use super::jwt::validate_token;
use super::models::AuthUser;
use crate::error::HttpAppError;

#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: String,
}

impl AuthState {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
        }
    }
}

fn unauthorized(message: &str) -> Response {
    HttpAppError(AppError::Unauthorized(message.to_string())).into_response()
}

/// Resolve `Authorization: Bearer <jwt>` to an [`AuthUser`].
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => return unauthorized("Missing authorization header"),
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return unauthorized("Invalid authorization header format");
    };

    let claims = match validate_token(token.trim(), &auth_state.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => return HttpAppError(e).into_response(),
    };

    tracing::debug!(user_id = %claims.sub, "Request authenticated");
    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
    });
    next.run(request).await
}
