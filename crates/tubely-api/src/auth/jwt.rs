//! HS256 access tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tubely_core::AppError;
use uuid::Uuid;

use super::models::Claims;

/// Validate a bearer token and return its claims.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        let reason = match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token has expired",
            jsonwebtoken::errors::ErrorKind::InvalidSignature => "Invalid token signature",
            _ => "Invalid token",
        };
        tracing::debug!(error = %e, "JWT validation failed");
        AppError::Unauthorized(reason.to_string())
    })?;

    Ok(token_data.claims)
}

/// Sign a token for `user_id` that expires after `ttl`.
pub fn issue_token(user_id: Uuid, secret: &str, ttl: Duration) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_issue_then_validate() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, SECRET, Duration::hours(1)).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), SECRET, Duration::hours(1)).unwrap();
        let err = validate_token(&token, "another-secret-that-is-32-chars!!").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // Past the default 60s leeway
        let token = issue_token(Uuid::new_v4(), SECRET, Duration::hours(-1)).unwrap();
        match validate_token(&token, SECRET).unwrap_err() {
            AppError::Unauthorized(msg) => assert_eq!(msg, "Token has expired"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(validate_token("not-a-jwt", SECRET).is_err());
    }
}
