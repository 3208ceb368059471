//! Session endpoints for cookie and bearer auth.

use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::super::{ApiError, ApiMessage};
use super::{
    state::{AuthConfig, AuthState},
    storage::{SessionRecord, delete_session, lookup_session, rotate_session},
    types::{SessionResponse, SessionUser},
    utils::hash_token,
};

const SESSION_COOKIE_NAME: &str = "skillxchange_session";
const CSRF_COOKIE_NAME: &str = "skillxchange_csrf";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 401, description = "No active session", body = SessionResponse)
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    // Missing cookies are an ordinary "not signed in", not an error.
    let Some(token) = extract_session_token(&headers) else {
        return unauthenticated();
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_token(&token);
    let record = match lookup_session(&pool, &token_hash).await {
        Ok(Some(record)) => record,
        Ok(None) => return unauthenticated(),
        Err(err) => return ApiError::Database(err).into_response(),
    };

    // Rotate tokens past the regenerate interval. Best effort: a rotation
    // failure never invalidates the current session.
    let mut response_headers = HeaderMap::new();
    let rotated_age = Utc::now()
        .signed_duration_since(record.rotated_at)
        .num_seconds();
    if rotated_age >= auth_state.config().session_regenerate_seconds() {
        match rotate_session(
            &pool,
            &token_hash,
            auth_state.config().session_lifetime_seconds(),
        )
        .await
        {
            Ok(Some(new_token)) => {
                if let Ok(cookie) = session_cookie(auth_state.config(), &new_token) {
                    response_headers.append(SET_COOKIE, cookie);
                }
            }
            Ok(None) => {}
            Err(err) => error!("Failed to rotate session: {err}"),
        }
    }

    let response = SessionResponse {
        success: true,
        is_authenticated: true,
        user: Some(public_user(record)),
    };
    (StatusCode::OK, response_headers, Json(response)).into_response()
}

/// Resolve a session token into a session record, if present.
///
/// Returns `Ok(None)` when the token is missing or does not resolve to an
/// unexpired session of an active user.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    pool: &PgPool,
) -> Result<Option<SessionRecord>, ApiError> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    let token_hash = hash_token(&token);
    Ok(lookup_session(pool, &token_hash).await?)
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = ApiMessage)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_token(&token);
        if let Err(err) = delete_session(&pool, &token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookies, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_cookie(auth_state.config(), SESSION_COOKIE_NAME, true) {
        response_headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = clear_cookie(auth_state.config(), CSRF_COOKIE_NAME, false) {
        response_headers.append(SET_COOKIE, cookie);
    }
    (
        StatusCode::OK,
        response_headers,
        Json(ApiMessage {
            success: true,
            message: "Logged out successfully".to_string(),
        }),
    )
        .into_response()
}

fn unauthenticated() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(SessionResponse {
            success: false,
            is_authenticated: false,
            user: None,
        }),
    )
        .into_response()
}

fn public_user(record: SessionRecord) -> SessionUser {
    SessionUser {
        user_id: record.user_id,
        full_name: record.full_name,
        email: record.email,
        account_status: record.account_status,
        rating: record.rating,
        total_exchanges: record.total_exchanges,
        member_since: record.member_since,
    }
}

/// Build the `HttpOnly` cookie carrying the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_lifetime_seconds();
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the CSRF companion cookie. Not `HttpOnly`: frontend scripts read it
/// to echo the value back in request headers.
pub(super) fn csrf_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.csrf_token_expiry_seconds();
    let secure = config.session_cookie_secure();
    let mut cookie =
        format!("{CSRF_COOKIE_NAME}={token}; Path=/; SameSite=Lax; Max-Age={ttl_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_cookie(
    config: &AuthConfig,
    name: &str,
    http_only: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{name}=; Path=/; SameSite=Lax; Max-Age=0");
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use axum::body::to_bytes;
    use sqlx::postgres::PgPoolOptions;

    fn config() -> AuthConfig {
        AuthConfig::new("http://localhost:3000".to_string())
    }

    fn auth_state() -> Arc<AuthState> {
        let limiter = Arc::new(super::super::rate_limit::NoopRateLimiter);
        Arc::new(AuthState::new(config(), limiter))
    }

    #[test]
    fn session_cookie_attributes() -> Result<()> {
        let cookie = session_cookie(&config(), "token")?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("skillxchange_session=token"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=7200"));
        assert!(!value.contains("Secure"));
        Ok(())
    }

    #[test]
    fn session_cookie_secure_with_https_frontend() -> Result<()> {
        let config = AuthConfig::new("https://skillxchange.dev".to_string());
        let cookie = session_cookie(&config, "token")?;
        assert!(cookie.to_str()?.contains("Secure"));
        Ok(())
    }

    #[test]
    fn csrf_cookie_is_script_readable() -> Result<()> {
        let cookie = csrf_cookie(&config(), "token")?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("skillxchange_csrf=token"));
        assert!(!value.contains("HttpOnly"));
        assert!(value.contains("Max-Age=3600"));
        Ok(())
    }

    #[test]
    fn extract_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("skillxchange_session=cookie-token"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn extract_token_parses_cookie_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("other=1; skillxchange_session=cookie-token; theme=dark"),
        );
        assert_eq!(
            extract_session_token(&headers),
            Some("cookie-token".to_string())
        );
    }

    #[test]
    fn extract_token_none_without_headers() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn session_without_token_is_unauthenticated() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = session(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(value["isAuthenticated"], serde_json::json!(false));
        Ok(())
    }

    #[tokio::test]
    async fn logout_without_session_still_succeeds() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = logout(HeaderMap::new(), Extension(pool), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);
        let first = cookies
            .first()
            .context("missing session cookie")?
            .to_str()?;
        assert!(first.contains("Max-Age=0"));
        Ok(())
    }
}
