//! Database helpers for users and sessions.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::utils::{generate_token, hash_token, is_unique_violation};

const SESSION_TOKEN_BYTES: usize = 32;

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created { user_id: i64 },
    Conflict,
}

/// Fields needed to verify a signin.
pub(super) struct UserRecord {
    pub(super) user_id: i64,
    pub(super) full_name: String,
    pub(super) email: String,
    pub(super) password_hash: String,
    pub(super) account_status: String,
}

/// Data returned for a valid session token.
pub(crate) struct SessionRecord {
    pub(crate) user_id: i64,
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) account_status: String,
    pub(crate) rating: f32,
    pub(crate) total_exchanges: i32,
    pub(crate) member_since: String,
    pub(super) rotated_at: DateTime<Utc>,
}

/// Insert a new user; the unique index on `LOWER(email)` is the authority on
/// duplicates, not a pre-check.
pub(super) async fn insert_user(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    password_hash: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users (full_name, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(full_name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created {
            user_id: row.get("user_id"),
        }),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Look up signin data by normalized email.
pub(super) async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT user_id, full_name, email, password_hash, account_status
        FROM users
        WHERE LOWER(email) = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    Ok(row.map(|row| UserRecord {
        user_id: row.get("user_id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        account_status: row.get("account_status"),
    }))
}

/// Create a session row and return the raw token for the cookie.
///
/// Retries on the cosmically unlikely token hash collision.
pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: i64,
    ip: Option<&str>,
    user_agent: Option<&str>,
    lifetime_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO sessions (user_id, token_hash, ip_address, user_agent, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_token(SESSION_TOKEN_BYTES)?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(&token_hash)
            .bind(ip)
            .bind(user_agent)
            .bind(lifetime_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

/// Resolve a token hash into an unexpired session joined to an active user.
pub(super) async fn lookup_session(
    pool: &PgPool,
    token_hash: &str,
) -> Result<Option<SessionRecord>> {
    let query = r#"
        SELECT users.user_id, users.full_name, users.email, users.account_status,
               users.rating, users.total_exchanges,
               to_char(users.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS member_since,
               sessions.rotated_at
        FROM sessions
        JOIN users ON users.user_id = sessions.user_id
        WHERE sessions.token_hash = $1
          AND sessions.expires_at > NOW()
          AND users.account_status = 'active'
        LIMIT 1
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("user_id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        account_status: row.get("account_status"),
        rating: row.get("rating"),
        total_exchanges: row.get("total_exchanges"),
        member_since: row.get("member_since"),
        rotated_at: row.get("rotated_at"),
    }))
}

/// Swap the session onto a fresh token and restart its lifetime.
///
/// Returns the new raw token, or `None` when the session disappeared or
/// expired under us; the caller keeps the old cookie in that case.
pub(super) async fn rotate_session(
    pool: &PgPool,
    old_token_hash: &str,
    lifetime_seconds: i64,
) -> Result<Option<String>> {
    let query = r"
        UPDATE sessions
        SET token_hash = $2,
            rotated_at = NOW(),
            expires_at = NOW() + ($3 * INTERVAL '1 second')
        WHERE token_hash = $1
          AND expires_at > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_token(SESSION_TOKEN_BYTES)?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(old_token_hash)
            .bind(&token_hash)
            .bind(lifetime_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => return Ok(Some(token)),
            Ok(_) => return Ok(None),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to rotate session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &str) -> Result<()> {
    // Logout is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM sessions WHERE token_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

/// Drop expired sessions. Runs opportunistically after signins instead of on
/// a schedule.
pub(super) async fn sweep_expired_sessions(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM sessions WHERE expires_at < NOW()";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to sweep expired sessions")?;
    Ok(result.rows_affected())
}
