//! Connection creation, listing, and deletion handlers.
//!
//! Creation is idempotent per user pair: an active exchange in either
//! direction short-circuits to the surviving row so the frontend can open the
//! existing chat instead of erroring.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use tracing::{error, info};

use super::super::auth::principal::require_auth;
use super::super::notify::{self, Notification};
use super::super::{ApiError, ApiMessage, ok_message};
use super::status::MeetingPreference;
use super::storage::{
    self, CreateOutcome, DeleteOutcome, NewConnection, insert_opening_message, skill_exists,
    user_exists,
};
use super::types::{
    AlreadyConnectedResponse, ConnectionCreatedResponse, ConnectionListResponse,
    CreateConnectionRequest, DeleteConnectionRequest,
};

#[utoipa::path(
    post,
    path = "/v1/exchanges",
    request_body = CreateConnectionRequest,
    responses(
        (status = 201, description = "Connection request created", body = ConnectionCreatedResponse),
        (status = 200, description = "Pair already connected", body = AlreadyConnectedResponse),
        (status = 400, description = "Invalid input", body = ApiMessage),
        (status = 401, description = "Not authenticated", body = ApiMessage),
        (status = 404, description = "Provider or skill not found", body = ApiMessage)
    ),
    tag = "exchanges"
)]
/// Creates a pending exchange towards a provider and notifies them.
/// A non-empty message also opens the conversation with that text.
pub async fn create_connection(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<CreateConnectionRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let request = match payload {
        Some(Json(payload)) => payload,
        None => return ApiError::Validation("Missing payload".to_string()).into_response(),
    };

    let (Some(provider_id), Some(requested_skill_id)) =
        (request.provider_id, request.requested_skill_id)
    else {
        return ApiError::Validation("Provider and skill are required".to_string())
            .into_response();
    };
    if provider_id <= 0 || requested_skill_id <= 0 {
        return ApiError::Validation("Invalid provider or skill ID".to_string()).into_response();
    }
    if provider_id == principal.user_id {
        return ApiError::Validation("Cannot connect with yourself".to_string()).into_response();
    }

    let meeting_preference = match request.meeting_preference.as_deref() {
        None | Some("") => MeetingPreference::Online,
        Some(value) => match MeetingPreference::parse(value) {
            Some(preference) => preference,
            None => {
                return ApiError::Validation("Invalid meeting preference".to_string())
                    .into_response();
            }
        },
    };

    match user_exists(&pool, provider_id).await {
        Ok(true) => {}
        Ok(false) => return ApiError::NotFound("Provider not found").into_response(),
        Err(err) => return err.into_response(),
    }
    match skill_exists(&pool, requested_skill_id).await {
        Ok(true) => {}
        Ok(false) => return ApiError::NotFound("Skill not found").into_response(),
        Err(err) => return err.into_response(),
    }

    let message = request.message.as_deref().map(str::trim).unwrap_or("");
    let new = NewConnection {
        provider_id,
        requested_skill_id,
        offered_skill_id: request.offered_skill_id.filter(|id| *id > 0),
        message,
        meeting_preference,
    };

    match storage::create_connection(&pool, principal.user_id, &new).await {
        Ok(CreateOutcome::AlreadyConnected { exchange_id }) => (
            StatusCode::OK,
            Json(AlreadyConnectedResponse {
                success: true,
                message: "Connection already exists. Opening chat...".to_string(),
                exchange_id,
                already_connected: true,
            }),
        )
            .into_response(),
        Ok(CreateOutcome::Created { exchange_id }) => {
            notify::send(
                &pool,
                provider_id,
                Some(exchange_id),
                &Notification::ExchangeRequest {
                    requester_name: principal.full_name.clone(),
                },
            )
            .await;

            if !message.is_empty() {
                if let Err(err) =
                    insert_opening_message(&pool, exchange_id, principal.user_id, provider_id, message)
                        .await
                {
                    error!("Failed to insert opening message: {err}");
                }
            }

            info!(
                exchange_id,
                requester_id = principal.user_id,
                provider_id,
                "Connection request created"
            );
            (
                StatusCode::CREATED,
                Json(ConnectionCreatedResponse {
                    success: true,
                    message: "Connection request sent successfully!".to_string(),
                    exchange_id,
                    conversation_started: true,
                }),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/exchanges",
    responses(
        (status = 200, description = "Connections for the caller", body = ConnectionListResponse),
        (status = 401, description = "Not authenticated", body = ApiMessage)
    ),
    tag = "exchanges"
)]
/// Lists both directions of the caller's exchanges, pending first.
pub async fn list_connections(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match storage::list_connections(&pool, principal.user_id).await {
        Ok(connections) => {
            let total_count = connections.len();
            (
                StatusCode::OK,
                Json(ConnectionListResponse {
                    success: true,
                    connections,
                    total_count,
                }),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/exchanges/delete",
    request_body = DeleteConnectionRequest,
    responses(
        (status = 200, description = "Connection deleted", body = ApiMessage),
        (status = 400, description = "Exchange is active or completed", body = ApiMessage),
        (status = 401, description = "Not authenticated", body = ApiMessage),
        (status = 403, description = "Caller is not a party", body = ApiMessage),
        (status = 404, description = "Exchange not found", body = ApiMessage),
        (status = 409, description = "Exchange changed concurrently", body = ApiMessage)
    ),
    tag = "exchanges"
)]
/// Permanently removes a never-active exchange and its notifications.
pub async fn delete_connection(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<DeleteConnectionRequest>>,
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

    let exchange = match storage::fetch_exchange(&pool, exchange_id).await {
        Ok(Some(exchange)) => exchange,
        Ok(None) => return ApiError::NotFound("Exchange not found").into_response(),
        Err(err) => return err.into_response(),
    };

    if !exchange.involves(principal.user_id) {
        return ApiError::Forbidden("You do not have permission to delete this exchange")
            .into_response();
    }
    if !exchange.status.deletable() {
        return ApiError::Validation(
            "Cannot delete an active or completed exchange. Please cancel it first.".to_string(),
        )
        .into_response();
    }

    match storage::delete_connection(&pool, exchange_id).await {
        Ok(DeleteOutcome::Deleted) => {
            info!(
                exchange_id,
                user_id = principal.user_id,
                "Exchange deleted permanently"
            );
            ok_message("Connection deleted permanently")
        }
        Ok(DeleteOutcome::Conflict) => ApiError::Conflict(
            "Exchange was modified concurrently. Please retry.".to_string(),
        )
        .into_response(),
        Err(err) => err.into_response(),
    }
}
