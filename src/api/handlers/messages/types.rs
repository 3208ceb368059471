//! Request and response bodies for the messaging endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub receiver_id: Option<i64>,
    pub message_text: Option<String>,
    /// Optional exchange to attach the message to.
    pub exchange_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    /// The peer whose messages to the caller should be marked read.
    pub sender_id: Option<i64>,
}

/// One message in a two-party conversation, oldest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message_text: String,
    pub is_read: bool,
    pub created_at: String,
    pub exchange_id: Option<i64>,
    pub sender_name: String,
    /// True when the caller sent this message.
    pub is_own: bool,
}

/// The other party of a conversation, echoed back for chat headers.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatPeer {
    pub user_id: i64,
    pub full_name: String,
    pub rating: f32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageListResponse {
    pub success: bool,
    pub messages: Vec<ChatMessage>,
    pub other_user: ChatPeer,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageSentResponse {
    pub success: bool,
    pub message: String,
    pub message_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResponse {
    pub success: bool,
    pub message: String,
    pub updated_count: u64,
}

/// One row of the inbox: the latest message per peer plus unread totals.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationSummary {
    pub other_user_id: i64,
    pub full_name: String,
    pub rating: f32,
    pub last_message: String,
    pub last_message_time: String,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationListResponse {
    pub success: bool,
    pub conversations: Vec<ConversationSummary>,
    pub count: usize,
}
