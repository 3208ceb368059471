//! API handlers and shared utilities for skillxchange.
//!
//! This module organizes the service's route handlers and provides the common
//! response envelope and error taxonomy used across them.

pub mod auth;
pub mod exchanges;
pub mod health;
pub mod messages;
pub mod notify;
pub mod root;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

/// Minimal response envelope; richer payloads embed the same `success` field.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

///// Build a `{success: false, message}` response with the given status.
pub(crate) fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiMessage {
            success: false,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Build a `{success: true, message}` response with status 200.
pub(crate) fn ok_message(message: impl Into<String>) -> Response {
    (
        StatusCode::OK,
        Json(ApiMessage {
            success: true,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Request-path failures, ordered by the check sequence handlers follow:
/// authentication, then shape, then existence, then authorization, then
/// business rules.
#[derive(Debug)]
pub(crate) enum ApiError {
    /// Malformed or missing input.
    Validation(String),
    /// No valid session.
    Unauthenticated,
    /// Authenticated but not allowed to act on the resource.
    Forbidden(&'static str),
    /// Referenced entity does not exist.
    NotFound(&'static str),
    /// State conflict (concurrent change or invalid transition).
    Conflict(String),
    /// Unexpected storage failure.
    Database(anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err)
    }
}

impl IntoResponse for ApiError {
    /// Maps failures into stable HTTP responses with the `{success, message}`
    /// envelope. Database errors are logged server-side and surfaced as `500`
    /// without leaking details.
    fn into_response(self) -> Response {
        match self {
            Self::Validation(message) => fail(StatusCode::BAD_REQUEST, message),
            Self::Unauthenticated => fail(StatusCode::UNAUTHORIZED, "Not authenticated"),
            Self::Forbidden(message) => fail(StatusCode::FORBIDDEN, message),
            Self::NotFound(message) => fail(StatusCode::NOT_FOUND, message),
            Self::Conflict(message) => fail(StatusCode::CONFLICT, message),
            Self::Database(err) => {
                error!("Database error: {err}");
                fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn envelope(response: Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn fail_sets_success_false() {
        let (status, body) = envelope(fail(StatusCode::BAD_REQUEST, "Invalid email format")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], serde_json::json!(false));
        assert_eq!(body["message"], serde_json::json!("Invalid email format"));
    }

    #[tokio::test]
    async fn ok_message_sets_success_true() {
        let (status, body) = envelope(ok_message("Logged out successfully")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn api_error_maps_statuses() {
        let cases = [
            (
                ApiError::Validation("No fields to update".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                ApiError::Forbidden("Only the provider can accept or reject this request"),
                StatusCode::FORBIDDEN,
            ),
            (ApiError::NotFound("Exchange not found"), StatusCode::NOT_FOUND),
            (
                ApiError::Conflict("Exchange was modified concurrently".to_string()),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, expected) in cases {
            let (status, body) = envelope(err.into_response()).await;
            assert_eq!(status, expected);
            assert_eq!(body["success"], serde_json::json!(false));
        }
    }

    #[tokio::test]
    async fn database_error_hides_details() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        let (status, body) = envelope(err.into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], serde_json::json!("Internal server error"));
    }
}
