//! Credential signin and session issuance.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use rand::Rng;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error};

use super::super::{ApiMessage, fail};
use super::login_rate_limit::{LoginGuard, LoginGuardError};
use super::password::verify_password;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::{csrf_cookie, session_cookie};
use super::state::AuthState;
use super::storage::{find_user_by_email, insert_session, sweep_expired_sessions};
use super::types::{SigninRequest, SigninResponse, SigninUser};
use super::utils::{extract_client_ip, extract_user_agent, generate_token, normalize_email};

#[utoipa::path(
    post,
    path = "/v1/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = SigninResponse),
        (status = 401, description = "Invalid credentials", body = ApiMessage),
        (status = 403, description = "Account not active", body = ApiMessage),
        (status = 429, description = "Rate limited or locked out", body = ApiMessage),
        (status = 503, description = "Lockout state unavailable", body = ApiMessage)
    ),
    tag = "auth"
)]
pub async fn signin(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SigninRequest>>,
) -> impl IntoResponse {
    let request: SigninRequest = match payload {
        Some(Json(payload)) => payload,
        None => return fail(StatusCode::BAD_REQUEST, "Missing payload"),
    };

    let client_ip = extract_client_ip(&headers);
    if let Some(ip) = client_ip.as_deref() {
        if let RateLimitDecision::Limited { .. } =
            auth_state.rate_limiter().check(RateLimitAction::Login, ip)
        {
            return fail(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again later.",
            );
        }
    }

    let email = request.email.trim().to_string();
    if email.is_empty() || request.password.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "All fields are required");
    }
    let email_normalized = normalize_email(&email);

    let guard = LoginGuard::new(
        pool.0.clone(),
        auth_state.config().max_login_attempts(),
        auth_state.config().login_lockout_seconds(),
    );
    match guard.check(&email_normalized).await {
        Ok(()) => {}
        Err(LoginGuardError::LockedOut { remaining_seconds }) => {
            let minutes = remaining_seconds.div_ceil(60).max(1);
            return fail(
                StatusCode::TOO_MANY_REQUESTS,
                format!("Too many login attempts. Please try again in {minutes} minutes."),
            );
        }
        Err(LoginGuardError::Unavailable) => {
            // Fail closed: without attempt counts the lockout cannot be enforced.
            return fail(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
            );
        }
    }

    let user = match find_user_by_email(&pool, &email_normalized).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            // Uniform response; never reveal whether the email exists.
            guard
                .record_failure(&email_normalized, client_ip.as_deref())
                .await;
            return fail(StatusCode::UNAUTHORIZED, "Invalid email or password");
        }
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    if user.account_status != "active" {
        return fail(
            StatusCode::FORBIDDEN,
            format!("Account is {}", user.account_status),
        );
    }

    if !verify_password(&request.password, &user.password_hash) {
        guard
            .record_failure(&email_normalized, client_ip.as_deref())
            .await;
        return fail(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }

    guard.clear(&email_normalized).await;

    let user_agent = extract_user_agent(&headers);
    let token = match insert_session(
        &pool,
        user.user_id,
        client_ip.as_deref(),
        user_agent.as_deref(),
        auth_state.config().session_lifetime_seconds(),
    )
    .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err}");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    // Opportunistic cleanup on roughly one signin in ten.
    if rand::thread_rng().gen_ratio(1, 10) {
        match sweep_expired_sessions(&pool).await {
            Ok(swept) if swept > 0 => debug!("Swept {swept} expired sessions"),
            Ok(_) => {}
            Err(err) => error!("Failed to sweep expired sessions: {err}"),
        }
    }

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = session_cookie(auth_state.config(), &token) {
        response_headers.append(SET_COOKIE, cookie);
    }
    match generate_token(auth_state.config().csrf_token_length()) {
        Ok(csrf_token) => {
            if let Ok(cookie) = csrf_cookie(auth_state.config(), &csrf_token) {
                response_headers.append(SET_COOKIE, cookie);
            }
        }
        Err(err) => error!("Failed to generate csrf token: {err}"),
    }

    (
        StatusCode::OK,
        response_headers,
        Json(SigninResponse {
            success: true,
            message: "Signed in successfully".to_string(),
            user: SigninUser {
                user_id: user.user_id,
                full_name: user.full_name,
                email: user.email,
            },
            token,
        }),
    )
        .into_response()
}
