//! Request/response types for connection and exchange APIs.
//!
//! These payloads are shared between handlers and `OpenAPI` generation.
//! Optional request fields mirror the frontend contract: absent and `null`
//! both mean "leave unchanged".

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConnectionRequest {
    pub provider_id: Option<i64>,
    pub requested_skill_id: Option<i64>,
    pub offered_skill_id: Option<i64>,
    pub message: Option<String>,
    pub meeting_preference: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateExchangeRequest {
    pub exchange_id: Option<i64>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub meeting_preference: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteConnectionRequest {
    pub exchange_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionCreatedResponse {
    pub success: bool,
    pub message: String,
    pub exchange_id: i64,
    pub conversation_started: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlreadyConnectedResponse {
    pub success: bool,
    pub message: String,
    pub exchange_id: i64,
    pub already_connected: bool,
}

/// One row of the caller's connection list with both parties and the skills
/// denormalized, so the frontend renders it without follow-up requests.
#[derive(Debug, Serialize, ToSchema)]
pub struct Connection {
    pub exchange_id: i64,
    pub status: String,
    pub message: String,
    pub meeting_preference: String,
    pub created_at: String,
    pub updated_at: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,

    /// Which side of the exchange the caller is on.
    pub is_requester: bool,
    pub role: String,

    pub requester_id: i64,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_rating: f32,
    pub requester_avatar: String,

    pub provider_id: i64,
    pub provider_name: String,
    pub provider_email: String,
    pub provider_rating: f32,
    pub provider_avatar: String,

    pub requested_skill_id: i64,
    pub requested_skill_name: String,
    pub requested_skill_category: Option<String>,

    pub offered_skill_id: Option<i64>,
    pub offered_skill_name: Option<String>,
    pub offered_skill_category: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionListResponse {
    pub success: bool,
    pub connections: Vec<Connection>,
    pub total_count: usize,
}
