use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use tubely_core::AppError;
use uuid::Uuid;

use crate::error::HttpAppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user_id
    pub exp: i64,  // expiration timestamp
    pub iat: i64,  // issued at timestamp
}

/// Authenticated caller, inserted into request extensions by the auth middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

// Extract from request parts so handlers can take it alongside Multipart
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().copied().ok_or_else(|| {
            HttpAppError(AppError::Unauthorized(
                "Missing authentication context".to_string(),
            ))
        })
    }
}
