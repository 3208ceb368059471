//! End-to-end flow over the documented router.
//!
//! Set `SKILLXCHANGE_TEST_DSN` to run; without it each test skips. The app is
//! assembled exactly like the server does it, minus the listener: documented
//! routes from the OpenAPI router plus auth state and pool extensions.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::{Body, to_bytes},
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use serde_json::{Value, json};
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use tower::ServiceExt;
use ulid::Ulid;

use skillxchange::api::{self, AuthConfig, AuthState, NoopRateLimiter};

const TEST_DSN_VAR: &str = "SKILLXCHANGE_TEST_DSN";

const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

async fn test_pool() -> Result<PgPool> {
    let Ok(dsn) = env::var(TEST_DSN_VAR) else {
        eprintln!("Skipping database test: {TEST_DSN_VAR} is not set");
        return Err(anyhow!("{TEST_DSN_VAR} is not set"));
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&dsn)
        .await
        .context("failed to connect test pool")?;
    apply_schema(&pool).await?;
    Ok(pool)
}

async fn apply_schema(pool: &PgPool) -> Result<()> {
    // The schema is idempotent, so concurrent test binaries can share a database.
    for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
    }

    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            statements.push(current.trim().to_string());
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn app(pool: PgPool) -> Router {
    let auth_state = Arc::new(AuthState::new(
        AuthConfig::new("http://localhost:3000".to_string()),
        Arc::new(NoopRateLimiter),
    ));
    let (router, _openapi) = api::router().split_for_parts();
    router.layer(Extension(auth_state)).layer(Extension(pool))
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match payload {
        Some(value) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body)?).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Ok((status, value))
}

/// Signs a fresh user up and in; returns `(user_id, session_token)`.
async fn signup_and_signin(app: &Router, full_name: &str, email: &str) -> Result<(i64, String)> {
    let (status, body) = request(
        app,
        "POST",
        "/v1/auth/signup",
        None,
        Some(json!({
            "full_name": full_name,
            "email": email,
            "password": "Str0ng!pass",
            "confirm_password": "Str0ng!pass",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");

    let (status, body) = request(
        app,
        "POST",
        "/v1/auth/signin",
        None,
        Some(json!({ "email": email, "password": "Str0ng!pass" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "signin failed: {body}");
    let user_id = body["user"]["user_id"]
        .as_i64()
        .context("missing user_id in signin response")?;
    let token = body["token"]
        .as_str()
        .context("missing token in signin response")?
        .to_string();
    Ok((user_id, token))
}

#[tokio::test]
async fn connection_flow_from_signup_to_delete_guard() -> Result<()> {
    let Ok(pool) = test_pool().await else {
        return Ok(());
    };
    let app = app(pool.clone());
    let suffix = Ulid::new().to_string().to_lowercase();

    let (alice_id, alice_token) = signup_and_signin(
        &app,
        "Flow Alice",
        &format!("flow-alice-{suffix}@example.com"),
    )
    .await?;
    let (bob_id, bob_token) =
        signup_and_signin(&app, "Flow Bob", &format!("flow-bob-{suffix}@example.com")).await?;

    // The session endpoint sees the fresh signin.
    let (status, body) = request(&app, "GET", "/v1/auth/session", Some(&alice_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAuthenticated"], json!(true));
    assert_eq!(body["user"]["full_name"], json!("Flow Alice"));

    // Bob offers a skill Alice wants.
    let skill = sqlx::query(
        r"
        INSERT INTO skills (user_id, skill_name, skill_type)
        VALUES ($1, 'Sourdough baking', 'offer')
        RETURNING skill_id
        ",
    )
    .bind(bob_id)
    .fetch_one(&pool)
    .await?;
    let skill_id: i64 = skill.get("skill_id");

    // Alice requests a connection with an opening message.
    let (status, body) = request(
        &app,
        "POST",
        "/v1/exchanges",
        Some(&alice_token),
        Some(json!({
            "provider_id": bob_id,
            "requested_skill_id": skill_id,
            "message": "hi",
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    assert_eq!(body["conversation_started"], json!(true));
    let exchange_id = body["exchange_id"]
        .as_i64()
        .context("missing exchange_id")?;

    let exchange = sqlx::query("SELECT status FROM exchanges WHERE exchange_id = $1")
        .bind(exchange_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(exchange.get::<String, _>("status"), "pending");

    let request_notifications = sqlx::query(
        "SELECT COUNT(*) AS n FROM notifications
         WHERE user_id = $1 AND related_id = $2 AND type = 'exchange_request'",
    )
    .bind(bob_id)
    .bind(exchange_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(request_notifications.get::<i64, _>("n"), 1);

    let opening = sqlx::query(
        "SELECT sender_id, receiver_id, message_text FROM messages WHERE exchange_id = $1",
    )
    .bind(exchange_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(opening.get::<i64, _>("sender_id"), alice_id);
    assert_eq!(opening.get::<i64, _>("receiver_id"), bob_id);
    assert_eq!(opening.get::<String, _>("message_text"), "hi");

    // Bob accepts; Alice is notified.
    let (status, body) = request(
        &app,
        "POST",
        "/v1/exchanges/update",
        Some(&bob_token),
        Some(json!({ "exchange_id": exchange_id, "status": "accepted" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "accept failed: {body}");

    let accept_notifications = sqlx::query(
        "SELECT COUNT(*) AS n FROM notifications
         WHERE user_id = $1 AND related_id = $2 AND type = 'exchange_accepted'",
    )
    .bind(alice_id)
    .bind(exchange_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(accept_notifications.get::<i64, _>("n"), 1);

    // An accepted exchange cannot be deleted, only cancelled.
    let (status, body) = request(
        &app,
        "POST",
        "/v1/exchanges/delete",
        Some(&alice_token),
        Some(json!({ "exchange_id": exchange_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!("Cannot delete an active or completed exchange. Please cancel it first.")
    );

    // The chat they started is visible to Bob with the opening message.
    let (status, body) = request(
        &app,
        "GET",
        &format!("/v1/messages?user_id={alice_id}"),
        Some(&bob_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["messages"][0]["message_text"], json!("hi"));
    assert_eq!(body["messages"][0]["is_own"], json!(false));
    Ok(())
}

#[tokio::test]
async fn logout_invalidates_the_session() -> Result<()> {
    let Ok(pool) = test_pool().await else {
        return Ok(());
    };
    let app = app(pool.clone());
    let suffix = Ulid::new().to_string().to_lowercase();

    let (_, token) = signup_and_signin(
        &app,
        "Flow Carol",
        &format!("flow-carol-{suffix}@example.com"),
    )
    .await?;

    let (status, body) = request(&app, "POST", "/v1/auth/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK, "logout failed: {body}");

    let (status, body) = request(&app, "GET", "/v1/auth/session", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["isAuthenticated"], json!(false));

    // Guarded endpoints reject the dead token outright.
    let (status, _) = request(&app, "GET", "/v1/exchanges", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
