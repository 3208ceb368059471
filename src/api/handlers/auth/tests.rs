//! Auth module tests that need a live Postgres.
//!
//! Set `SKILLXCHANGE_TEST_DSN` to run them; without it each test skips.

use super::login_rate_limit::{LoginGuard, LoginGuardError};
use super::password::{hash_password, verify_password};
use super::storage::{
    SignupOutcome, delete_session, find_user_by_email, insert_session, insert_user,
    lookup_session, rotate_session, sweep_expired_sessions,
};
use super::utils::{hash_token, normalize_email};
use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::env;
use ulid::Ulid;

const TEST_DSN_VAR: &str = "SKILLXCHANGE_TEST_DSN";

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

struct TestDb {
    pool: PgPool,
}

impl TestDb {
    async fn new() -> Result<Self> {
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

        Ok(Self { pool })
    }
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

fn unique_email(prefix: &str) -> String {
    let suffix = Ulid::new().to_string().to_lowercase();
    format!("{prefix}-{suffix}@example.com")
}

async fn create_user(pool: &PgPool, prefix: &str) -> Result<(i64, String)> {
    let email_normalized = normalize_email(&unique_email(prefix));
    let password_hash = hash_password("Sup3r!Secret")?;
    match insert_user(pool, "Test User", &email_normalized, &password_hash).await? {
        SignupOutcome::Created { user_id } => Ok((user_id, email_normalized)),
        SignupOutcome::Conflict => Err(anyhow!("unexpected conflict creating test user")),
    }
}

#[tokio::test]
async fn signup_then_verify_credentials() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let email_normalized = normalize_email(&unique_email("alice"));
    let password_hash = hash_password("Sup3r!Secret")?;
    let outcome = insert_user(&db.pool, "Alice Doe", &email_normalized, &password_hash).await?;
    let SignupOutcome::Created { user_id } = outcome else {
        return Err(anyhow!("expected a created user"));
    };
    assert!(user_id > 0);

    let user = find_user_by_email(&db.pool, &email_normalized)
        .await?
        .context("user not found after signup")?;
    assert_eq!(user.user_id, user_id);
    assert_eq!(user.full_name, "Alice Doe");
    assert_eq!(user.email, email_normalized);
    assert_eq!(user.account_status, "active");
    assert!(verify_password("Sup3r!Secret", &user.password_hash));
    assert!(!verify_password("Sup3r!Secre", &user.password_hash));

    Ok(())
}

#[tokio::test]
async fn signup_concurrent_email_unique() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let email_normalized = normalize_email(&unique_email("bob"));
    let password_hash = hash_password("Sup3r!Secret")?;

    let task_one = insert_user(&db.pool, "Bob", &email_normalized, &password_hash);
    let task_two = insert_user(&db.pool, "Bob", &email_normalized, &password_hash);
    let (result_one, result_two) = tokio::join!(task_one, task_two);

    let outcomes = [result_one?, result_two?];
    let created = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, SignupOutcome::Created { .. }))
        .count();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, SignupOutcome::Conflict))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 1);

    // The unique index is on LOWER(email), so case changes still collide.
    let mixed_case = insert_user(
        &db.pool,
        "Bob",
        &email_normalized.to_uppercase(),
        &password_hash,
    )
    .await?;
    assert!(matches!(mixed_case, SignupOutcome::Conflict));

    Ok(())
}

#[tokio::test]
async fn session_lifecycle() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let (user_id, email) = create_user(&db.pool, "carol").await?;
    let token = insert_session(&db.pool, user_id, Some("10.0.0.1"), Some("tests/1.0"), 3600).await?;

    let record = lookup_session(&db.pool, &hash_token(&token))
        .await?
        .context("session not found after insert")?;
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.email, email);
    assert_eq!(record.account_status, "active");
    assert_eq!(record.total_exchanges, 0);
    assert!(record.member_since.ends_with('Z'));

    delete_session(&db.pool, &hash_token(&token)).await?;
    assert!(lookup_session(&db.pool, &hash_token(&token)).await?.is_none());

    // Logout again is a no-op.
    delete_session(&db.pool, &hash_token(&token)).await?;

    Ok(())
}

#[tokio::test]
async fn expired_session_rejected_and_swept() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let (user_id, _) = create_user(&db.pool, "dave").await?;
    let token = insert_session(&db.pool, user_id, None, None, 3600).await?;

    sqlx::query("UPDATE sessions SET expires_at = NOW() - INTERVAL '1 second' WHERE token_hash = $1")
        .bind(hash_token(&token))
        .execute(&db.pool)
        .await
        .context("failed to expire session")?;

    assert!(lookup_session(&db.pool, &hash_token(&token)).await?.is_none());
    let swept = sweep_expired_sessions(&db.pool).await?;
    assert!(swept >= 1);

    Ok(())
}

#[tokio::test]
async fn suspended_account_session_rejected() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let (user_id, _) = create_user(&db.pool, "erin").await?;
    let token = insert_session(&db.pool, user_id, None, None, 3600).await?;

    sqlx::query("UPDATE users SET account_status = 'suspended' WHERE user_id = $1")
        .bind(user_id)
        .execute(&db.pool)
        .await
        .context("failed to suspend user")?;

    assert!(lookup_session(&db.pool, &hash_token(&token)).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn session_rotation_replaces_token() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let (user_id, _) = create_user(&db.pool, "frank").await?;
    let token = insert_session(&db.pool, user_id, None, None, 3600).await?;

    let new_token = rotate_session(&db.pool, &hash_token(&token), 3600)
        .await?
        .context("rotation found no session")?;
    assert_ne!(new_token, token);
    assert!(lookup_session(&db.pool, &hash_token(&token)).await?.is_none());
    assert!(
        lookup_session(&db.pool, &hash_token(&new_token))
            .await?
            .is_some()
    );

    // Rotating a token that no longer exists is a no-op.
    assert!(
        rotate_session(&db.pool, &hash_token(&token), 3600)
            .await?
            .is_none()
    );

    Ok(())
}

#[tokio::test]
async fn login_guard_locks_and_clears() -> Result<()> {
    let Ok(db) = TestDb::new().await else {
        return Ok(());
    };

    let guard = LoginGuard::new(db.pool.clone(), 3, 60);
    let email = normalize_email(&unique_email("grace"));

    guard
        .check(&email)
        .await
        .map_err(|err| anyhow!("unexpected guard error: {err}"))?;

    for _ in 0..3 {
        guard.record_failure(&email, Some("10.0.0.9")).await;
    }

    match guard.check(&email).await {
        Err(LoginGuardError::LockedOut { remaining_seconds }) => {
            assert!((1..=60).contains(&remaining_seconds));
        }
        other => return Err(anyhow!("expected lockout, got {other:?}")),
    }

    guard.clear(&email).await;
    guard
        .check(&email)
        .await
        .map_err(|err| anyhow!("guard still locked after clear: {err}"))?;

    Ok(())
}
