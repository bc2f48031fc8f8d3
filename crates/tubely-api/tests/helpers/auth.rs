use chrono::Duration;
use tubely_api::auth::jwt::issue_token;
use uuid::Uuid;

/// Secret the test config is built with.
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// `Authorization` header value for `user_id`.
pub fn bearer(user_id: Uuid) -> String {
    let token = issue_token(user_id, TEST_JWT_SECRET, Duration::hours(1)).expect("sign token");
    format!("Bearer {}", token)
}

/// Token signed with a secret the server does not know.
pub fn forged_bearer(user_id: Uuid) -> String {
    let token = issue_token(
        user_id,
        "some-other-secret-that-is-also-32-chars",
        Duration::hours(1),
    )
    .expect("sign token");
    format!("Bearer {}", token)
}
