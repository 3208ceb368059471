//! Exchange update handler.
//!
//! Status changes are checked against the transition graph before any write,
//! and the write itself is guarded by a compare-and-set on the status the
//! caller saw. Party and provider-role checks run before the graph check so a
//! non-party probing an exchange always sees 403, never a state hint.

use axum::{
    Json,
    extract::Extension,
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::info;

use super::super::auth::principal::require_auth;
use super::super::notify::{self, Notification};
use super::super::{ApiError, ApiMessage, ok_message};
use super::status::{ExchangeStatus, MeetingPreference};
use super::storage::{self, ExchangePatch, ExchangeRow};
use super::types::UpdateExchangeRequest;

#[utoipa::path(
    post,
    path = "/v1/exchanges/update",
    request_body = UpdateExchangeRequest,
    responses(
        (status = 200, description = "Exchange updated", body = ApiMessage),
        (status = 400, description = "Invalid input", body = ApiMessage),
        (status = 401, description = "Not authenticated", body = ApiMessage),
        (status = 403, description = "Caller may not perform this update", body = ApiMessage),
        (status = 404, description = "Exchange not found", body = ApiMessage),
        (status = 409, description = "Transition not allowed or concurrent update", body = ApiMessage)
    ),
    tag = "exchanges"
)]
/// Applies a partial update to an exchange the caller is a party to.
/// Accepting notifies the requester; completing stamps `completed_at`.
pub async fn update_exchange(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<UpdateExchangeRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let request = match payload {
        Some(Json(payload)) => payload,
        None => return ApiError::Validation("Missing payload".to_string()).into_response(),
    };
    let Some(exchange_id) = request.exchange_id.filter(|id| *id > 0) else {
        return ApiError::Validation("Exchange ID is required".to_string()).into_response();
    };

    let patch = match parse_patch(&request) {
        Ok(patch) => patch,
        Err(err) => return err.into_response(),
    };

    let exchange = match storage::fetch_exchange(&pool, exchange_id).await {
        Ok(Some(exchange)) => exchange,
        Ok(None) => return ApiError::NotFound("Exchange not found").into_response(),
        Err(err) => return err.into_response(),
    };

    if let Err(err) = authorize_patch(principal.user_id, &exchange, &patch) {
        return err.into_response();
    }

    match storage::apply_patch(&pool, exchange_id, exchange.status, &patch).await {
        Ok(true) => {}
        Ok(false) => {
            return ApiError::Conflict(
                "Exchange was modified concurrently. Please retry.".to_string(),
            )
            .into_response();
        }
        Err(err) => return err.into_response(),
    }

    if patch.status == Some(ExchangeStatus::Accepted) {
        notify::send(
            &pool,
            exchange.requester_id,
            Some(exchange_id),
            &Notification::ExchangeAccepted {
                provider_name: principal.full_name.clone(),
            },
        )
        .await;
    }

    info!(
        exchange_id,
        user_id = principal.user_id,
        status = ?patch.status,
        "Exchange updated"
    );
    ok_message("Exchange updated successfully")
}

/// Validates the request fields and folds them into a patch.
fn parse_patch(request: &UpdateExchangeRequest) -> Result<ExchangePatch, ApiError> {
    let status = match request.status.as_deref() {
        None => None,
        Some(value) => Some(
            ExchangeStatus::parse(value)
                .ok_or_else(|| ApiError::Validation("Invalid status value".to_string()))?,
        ),
    };
    let meeting_preference = match request.meeting_preference.as_deref() {
        None => None,
        Some(value) => Some(
            MeetingPreference::parse(value)
                .ok_or_else(|| ApiError::Validation("Invalid meeting preference".to_string()))?,
        ),
    };

    let patch = ExchangePatch {
        status,
        start_date: parse_date(request.start_date.as_deref(), "start date")?,
        end_date: parse_date(request.end_date.as_deref(), "end date")?,
        meeting_preference,
        message: request.message.clone(),
    };
    if patch.is_empty() {
        return Err(ApiError::Validation("No fields to update".to_string()));
    }
    Ok(patch)
}

fn parse_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    match value {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("Invalid {field}. Use YYYY-MM-DD"))),
    }
}

/// Party and role checks, then the transition graph. Order matters: a
/// non-party must get 403 before any state detail leaks through a 409.
fn authorize_patch(
    user_id: i64,
    exchange: &ExchangeRow,
    patch: &ExchangePatch,
) -> Result<(), ApiError> {
    if !exchange.involves(user_id) {
        return Err(ApiError::Forbidden(
            "You do not have permission to update this exchange",
        ));
    }
    if let Some(next) = patch.status {
        if next.provider_only() && user_id != exchange.provider_id {
            return Err(ApiError::Forbidden(
                "Only the provider can accept or reject this request",
            ));
        }
        if !exchange.status.can_transition(next) {
            return Err(ApiError::Conflict(format!(
                "Cannot change status from {} to {next}",
                exchange.status
            )));
        }
    }
    Ok(())
}
