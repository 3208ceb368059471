//! Account registration.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::super::{ApiMessage, fail};
use super::password::{hash_password, validate_strength};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{SignupOutcome, insert_user};
use super::types::{PasswordPolicyResponse, SignupRequest, SignupResponse};
use super::utils::{extract_client_ip, normalize_email, valid_email};

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Validation error", body = PasswordPolicyResponse),
        (status = 409, description = "Email already registered", body = ApiMessage),
        (status = 429, description = "Rate limited", body = ApiMessage)
    ),
    tag = "auth"
)]
pub async fn signup(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return fail(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let client_ip = extract_client_ip(&headers);
    if let Some(ip) = client_ip.as_deref() {
        if let RateLimitDecision::Limited { .. } = auth_state
            .rate_limiter()
            .check(RateLimitAction::Signup, ip)
        {
            return fail(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again later.",
            );
        }
    }

    let full_name = request.full_name.trim().to_string();
    let email = request.email.trim().to_string();

    // Passwords are compared as sent; only display fields are trimmed.
    if full_name.is_empty()
        || email.is_empty()
        || request.password.is_empty()
        || request.confirm_password.is_empty()
    {
        return fail(StatusCode::BAD_REQUEST, "All fields are required");
    }

    let email_normalized = normalize_email(&email);
    if !valid_email(&email_normalized) {
        return fail(StatusCode::BAD_REQUEST, "Invalid email format");
    }

    if request.password != request.confirm_password {
        return fail(StatusCode::BAD_REQUEST, "Passwords do not match");
    }

    let policy_errors =
        validate_strength(&request.password, auth_state.config().password_min_length());
    if !policy_errors.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(PasswordPolicyResponse {
                success: false,
                message: "Password requirements not met".to_string(),
                errors: policy_errors,
            }),
        )
            .into_response();
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    match insert_user(&pool, &full_name, &email_normalized, &password_hash).await {
        Ok(SignupOutcome::Created { user_id }) => (
            StatusCode::CREATED,
            Json(SignupResponse {
                success: true,
                message: "Account created successfully".to_string(),
                user_id,
            }),
        )
            .into_response(),
        Ok(SignupOutcome::Conflict) => fail(StatusCode::CONFLICT, "Email already registered"),
        Err(err) => {
            error!("Signup failed: {err}");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::{FixedWindowLimiter, NoopRateLimiter, RateLimiter};
    use super::super::state::{AuthConfig, AuthState};
    use super::signup;
    use anyhow::Result;
    use axum::body::to_bytes;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use sqlx::PgPool;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        let limiter: Arc<dyn RateLimiter> = Arc::new(NoopRateLimiter);
        Arc::new(AuthState::new(config, limiter))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    fn request(
        full_name: &str,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> super::SignupRequest {
        super::SignupRequest {
            full_name: full_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    async fn body_json(response: axum::response::Response) -> Result<serde_json::Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn signup_missing_payload() -> Result<()> {
        let response = signup(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn signup_requires_all_fields() -> Result<()> {
        let response = signup(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(axum::Json(request("", "alice@example.com", "Str0ng!pass", "Str0ng!pass"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await?;
        assert_eq!(body["message"], serde_json::json!("All fields are required"));
        Ok(())
    }

    #[tokio::test]
    async fn signup_rejects_invalid_email() -> Result<()> {
        let response = signup(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(axum::Json(request("Alice", "not-an-email", "Str0ng!pass", "Str0ng!pass"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await?;
        assert_eq!(body["message"], serde_json::json!("Invalid email format"));
        Ok(())
    }

    #[tokio::test]
    async fn signup_rejects_password_mismatch() -> Result<()> {
        let response = signup(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(axum::Json(request("Alice", "alice@example.com", "Str0ng!pass", "Different1!"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await?;
        assert_eq!(body["message"], serde_json::json!("Passwords do not match"));
        Ok(())
    }

    #[tokio::test]
    async fn signup_reports_policy_violations() -> Result<()> {
        let response = signup(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(axum::Json(request("Alice", "alice@example.com", "weak", "weak"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await?;
        assert_eq!(
            body["message"],
            serde_json::json!("Password requirements not met")
        );
        let errors = body["errors"].as_array().map(Vec::len).unwrap_or(0);
        assert!(errors >= 3);
        Ok(())
    }

    #[tokio::test]
    async fn signup_rate_limits_by_ip() -> Result<()> {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        let limiter: Arc<dyn RateLimiter> = Arc::new(FixedWindowLimiter::new(1, 60));
        let state = Arc::new(AuthState::new(config, limiter));
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));

        // First request passes validation (and fails later on the empty name);
        // the second is cut off by the limiter before validation.
        let first = signup(
            headers.clone(),
            Extension(lazy_pool()?),
            Extension(state.clone()),
            Some(axum::Json(request("", "", "", ""))),
        )
        .await
        .into_response();
        assert_eq!(first.status(), StatusCode::BAD_REQUEST);

        let second = signup(
            headers,
            Extension(lazy_pool()?),
            Extension(state),
            Some(axum::Json(request("", "", "", ""))),
        )
        .await
        .into_response();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        Ok(())
    }
}
