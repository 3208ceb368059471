//! Authenticated principal extraction.
//!
//! Flow Overview: read the session cookie or bearer token, resolve it to an
//! active user, and return a principal that downstream handlers can use.
//! Authentication runs before any other validation on protected endpoints.

use axum::http::HeaderMap;
use sqlx::PgPool;

use super::super::ApiError;
use super::session::authenticate_session;

/// Authenticated user context derived from the session token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
}

/// Resolve a session token into a principal, or fail with 401.
pub(crate) async fn require_auth(headers: &HeaderMap, pool: &PgPool) -> Result<Principal, ApiError> {
    match authenticate_session(headers, pool).await? {
        Some(record) => Ok(Principal {
            user_id: record.user_id,
            full_name: record.full_name,
            email: record.email,
        }),
        None => Err(ApiError::Unauthenticated),
    }
}
