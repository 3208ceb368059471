//! Inbox overview: latest message and unread count per peer.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;

use super::super::auth::principal::require_auth;
use super::super::ApiMessage;
use super::storage;
use super::types::ConversationListResponse;

#[utoipa::path(
    get,
    path = "/v1/messages/conversations",
    responses(
        (status = 200, description = "Conversations ordered by latest activity", body = ConversationListResponse),
        (status = 401, description = "Not authenticated", body = ApiMessage)
    ),
    tag = "messages"
)]
/// Lists the caller's conversations, most recently active first.
pub async fn list_conversations(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match storage::list_conversations(&pool, principal.user_id).await {
        Ok(conversations) => {
            let count = conversations.len();
            (
                StatusCode::OK,
                Json(ConversationListResponse {
                    success: true,
                    conversations,
                    count,
                }),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}
