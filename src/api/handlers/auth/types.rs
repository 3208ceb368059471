//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub user_id: i64,
}

/// Failure payload listing every violated password rule.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordPolicyResponse {
    pub success: bool,
    pub message: String,
    pub errors: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninUser {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninResponse {
    pub success: bool,
    pub message: String,
    pub user: SigninUser,
    /// Raw session token, also set as the session cookie.
    pub token: String,
}

/// Public profile fields; never includes the password hash.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionUser {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub account_status: String,
    pub rating: f32,
    pub total_exchanges: i32,
    pub member_since: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub success: bool,
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn signup_request_round_trips() -> Result<()> {
        let request = SignupRequest {
            full_name: "Alice Johnson".to_string(),
            email: "alice@example.com".to_string(),
            password: "Str0ng!pass".to_string(),
            confirm_password: "Str0ng!pass".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: SignupRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.full_name, "Alice Johnson");
        Ok(())
    }

    #[test]
    fn session_response_renames_is_authenticated() -> Result<()> {
        let response = SessionResponse {
            success: true,
            is_authenticated: true,
            user: None,
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(value["isAuthenticated"], serde_json::json!(true));
        assert!(value.get("user").is_none());
        Ok(())
    }

    #[test]
    fn session_user_serializes_public_fields() -> Result<()> {
        let user = SessionUser {
            user_id: 3,
            full_name: "Bob Lee".to_string(),
            email: "bob@example.com".to_string(),
            account_status: "active".to_string(),
            rating: 4.5,
            total_exchanges: 12,
            member_since: "2025-01-15T09:30:00Z".to_string(),
        };
        let value = serde_json::to_value(&user)?;
        assert_eq!(value["user_id"], serde_json::json!(3));
        assert!(value.get("password_hash").is_none());
        Ok(())
    }
}
