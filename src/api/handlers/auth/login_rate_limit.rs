//! Database-backed lockout for repeated failed logins.
//!
//! Flow Overview:
//! 1) Failed signins append a row to `login_attempts` per email.
//! 2) Reaching the limit inside the lockout window denies further attempts
//!    until the newest failure ages out.
//! 3) A successful signin clears the email's attempts.
//!
//! Scaling: uses `PostgreSQL` so the lockout holds across service instances.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{Instrument, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(super) enum LoginGuardError {
    #[error("Locked out: {remaining_seconds}s remaining")]
    LockedOut { remaining_seconds: u64 },
    #[error("Login attempt storage unavailable")]
    Unavailable,
}

#[derive(Debug)]
pub(super) struct LoginGuard {
    pool: PgPool,
    max_attempts: i64,
    lockout_seconds: i64,
}

impl LoginGuard {
    pub(super) fn new(pool: PgPool, max_attempts: i64, lockout_seconds: i64) -> Self {
        Self {
            pool,
            max_attempts,
            lockout_seconds,
        }
    }

    /// Checks whether the email is currently locked out.
    ///
    /// # Errors
    /// Returns `LockedOut` when the failure count within the window reached the
    /// limit, and `Unavailable` when the count cannot be read. Storage failures
    /// fail closed.
    pub(super) async fn check(&self, email: &str) -> Result<(), LoginGuardError> {
        let query = r"
            SELECT COUNT(*) AS attempts, MAX(attempted_at) AS last_attempt
            FROM login_attempts
            WHERE email = $1
              AND attempted_at > NOW() - ($2 * INTERVAL '1 second')
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .bind(self.lockout_seconds)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(|err| {
                error!("Failed to count login attempts: {err}");
                LoginGuardError::Unavailable
            })?;

        let attempts: i64 = row.get("attempts");
        if attempts < self.max_attempts {
            return Ok(());
        }

        let last_attempt: Option<DateTime<Utc>> = row.get("last_attempt");
        let remaining_seconds =
            remaining_lockout_seconds(last_attempt, Utc::now(), self.lockout_seconds);
        Err(LoginGuardError::LockedOut { remaining_seconds })
    }

    /// Appends a failed attempt. Failures here are logged, never surfaced; the
    /// caller still returns the uniform credentials error.
    pub(super) async fn record_failure(&self, email: &str, ip: Option<&str>) {
        let query = "INSERT INTO login_attempts (email, ip_address) VALUES ($1, $2)";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        if let Err(err) = sqlx::query(query)
            .bind(email)
            .bind(ip)
            .execute(&self.pool)
            .instrument(span)
            .await
        {
            error!("Failed to record login attempt: {err}");
        }
    }

    /// Clears the email's attempts after a successful signin.
    pub(super) async fn clear(&self, email: &str) {
        let query = "DELETE FROM login_attempts WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        if let Err(err) = sqlx::query(query)
            .bind(email)
            .execute(&self.pool)
            .instrument(span)
            .await
        {
            error!("Failed to clear login attempts: {err}");
        }
    }
}

/// Seconds until the newest failure leaves the lockout window, at least 1.
fn remaining_lockout_seconds(
    last_attempt: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lockout_seconds: i64,
) -> u64 {
    let Some(last_attempt) = last_attempt else {
        return u64::try_from(lockout_seconds).unwrap_or(0).max(1);
    };
    let elapsed = now.signed_duration_since(last_attempt).num_seconds();
    let remaining = lockout_seconds.saturating_sub(elapsed).max(1);
    u64::try_from(remaining).unwrap_or(1)
}
