//! Two-party chat: fetch history, send, and mark read.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use tracing::info;

use super::super::auth::principal::require_auth;
use super::super::notify::{self, Notification};
use super::super::{ApiError, ApiMessage};
use super::storage;
use super::types::{
    MarkReadRequest, MarkReadResponse, MessageListResponse, MessageSentResponse, MessagesQuery,
    SendMessageRequest,
};

#[utoipa::path(
    get,
    path = "/v1/messages",
    params(
        ("user_id" = Option<i64>, Query, description = "Peer to load the conversation with")
    ),
    responses(
        (status = 200, description = "Conversation with the peer, oldest first", body = MessageListResponse),
        (status = 400, description = "Missing peer id", body = ApiMessage),
        (status = 401, description = "Not authenticated", body = ApiMessage),
        (status = 404, description = "Peer not found", body = ApiMessage)
    ),
    tag = "messages"
)]
/// Returns the full history between the caller and one peer.
pub async fn get_messages(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Query(params): Query<MessagesQuery>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let Some(other_user_id) = params.user_id.filter(|id| *id > 0) else {
        return ApiError::Validation("User ID required".to_string()).into_response();
    };

    let peer = match storage::fetch_peer(&pool, other_user_id).await {
        Ok(Some(peer)) => peer,
        Ok(None) => return ApiError::NotFound("User not found").into_response(),
        Err(err) => return err.into_response(),
    };

    match storage::list_messages(&pool, principal.user_id, other_user_id).await {
        Ok(messages) => {
            let count = messages.len();
            (
                StatusCode::OK,
                Json(MessageListResponse {
                    success: true,
                    messages,
                    other_user: peer,
                    count,
                }),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = MessageSentResponse),
        (status = 400, description = "Invalid input", body = ApiMessage),
        (status = 401, description = "Not authenticated", body = ApiMessage),
        (status = 404, description = "Receiver not found", body = ApiMessage)
    ),
    tag = "messages"
)]
/// Stores a message and notifies the receiver with a 50-char preview.
pub async fn send_message(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<SendMessageRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let request = match payload {
        Some(Json(payload)) => payload,
        None => return ApiError::Validation("Missing payload".to_string()).into_response(),
    };

    let receiver_id = request.receiver_id.filter(|id| *id > 0);
    let text = request.message_text.as_deref().map(str::trim).unwrap_or("");
    let Some(receiver_id) = receiver_id else {
        return ApiError::Validation("Receiver and message text are required".to_string())
            .into_response();
    };
    if text.is_empty() {
        return ApiError::Validation("Receiver and message text are required".to_string())
            .into_response();
    }
    if receiver_id == principal.user_id {
        return ApiError::Validation("Cannot send message to yourself".to_string())
            .into_response();
    }

    match storage::fetch_peer(&pool, receiver_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return ApiError::NotFound("Receiver not found").into_response(),
        Err(err) => return err.into_response(),
    }

    let exchange_id = request.exchange_id.filter(|id| *id > 0);
    let message_id =
        match storage::insert_message(&pool, principal.user_id, receiver_id, text, exchange_id)
            .await
        {
            Ok(message_id) => message_id,
            Err(err) => return err.into_response(),
        };

    notify::send(
        &pool,
        receiver_id,
        Some(message_id),
        &Notification::NewMessage {
            sender_name: principal.full_name.clone(),
            body: text.to_string(),
        },
    )
    .await;

    info!(
        message_id,
        sender_id = principal.user_id,
        receiver_id,
        "Message sent"
    );
    (
        StatusCode::CREATED,
        Json(MessageSentResponse {
            success: true,
            message: "Message sent successfully".to_string(),
            message_id,
        }),
    )
        .into_response()
}

#[utoipa::path(
    put,
    path = "/v1/messages/read",
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Unread messages from the peer flipped to read", body = MarkReadResponse),
        (status = 400, description = "Missing sender id", body = ApiMessage),
        (status = 401, description = "Not authenticated", body = ApiMessage)
    ),
    tag = "messages"
)]
/// Marks everything a peer sent to the caller as read.
pub async fn mark_messages_read(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<MarkReadRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let request = match payload {
        Some(Json(payload)) => payload,
        None => return ApiError::Validation("Missing payload".to_string()).into_response(),
    };
    let Some(sender_id) = request.sender_id.filter(|id| *id > 0) else {
        return ApiError::Validation("Sender ID required".to_string()).into_response();
    };

    match storage::mark_read(&pool, principal.user_id, sender_id).await {
        Ok(updated_count) => (
            StatusCode::OK,
            Json(MarkReadResponse {
                success: true,
                message: "Messages marked as read".to_string(),
                updated_count,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
