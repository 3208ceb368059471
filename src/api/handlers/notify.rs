//! Notification side effects for exchange and messaging events.
//!
//! Inserts are best-effort: a failed insert is logged and never fails the
//! operation that triggered it.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{Instrument, error};

const MESSAGE_PREVIEW_CHARS: usize = 50;

/// A notification to deliver to a single user.
pub(crate) enum Notification {
    /// Someone asked to connect; goes to the provider.
    ExchangeRequest { requester_name: String },
    /// The provider accepted; goes to the requester.
    ExchangeAccepted { provider_name: String },
    /// A direct message arrived; goes to the receiver.
    NewMessage { sender_name: String, body: String },
}

impl Notification {
    fn kind(&self) -> &'static str {
        match self {
            Self::ExchangeRequest { .. } => "exchange_request",
            Self::ExchangeAccepted { .. } => "exchange_accepted",
            Self::NewMessage { .. } => "new_message",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::ExchangeRequest { .. } => "New Connection Request",
            Self::ExchangeAccepted { .. } => "Connection Accepted!",
            Self::NewMessage { .. } => "New Message",
        }
    }

    fn body(&self) -> String {
        match self {
            Self::ExchangeRequest { requester_name } => {
                format!("{requester_name} wants to connect with you!")
            }
            Self::ExchangeAccepted { provider_name } => {
                format!("{provider_name} accepted your connection request!")
            }
            Self::NewMessage { sender_name, body } => {
                let preview: String = body.chars().take(MESSAGE_PREVIEW_CHARS).collect();
                format!("{sender_name}: {preview}")
            }
        }
    }
}

/// Insert a notification, logging failures instead of surfacing them.
pub(crate) async fn send(
    pool: &PgPool,
    recipient_id: i64,
    related_id: Option<i64>,
    notification: &Notification,
) {
    if let Err(err) = insert(pool, recipient_id, related_id, notification).await {
        error!("Failed to insert notification: {err}");
    }
}

async fn insert(
    pool: &PgPool,
    recipient_id: i64,
    related_id: Option<i64>,
    notification: &Notification,
) -> Result<()> {
    let query = r"
        INSERT INTO notifications (user_id, type, title, message, related_id)
        VALUES ($1, $2, $3, $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(recipient_id)
        .bind(notification.kind())
        .bind(notification.title())
        .bind(notification.body())
        .bind(related_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert notification")?;
    Ok(())
}

/// Remove an exchange's notifications inside the caller's delete transaction.
pub(crate) async fn delete_for_exchange(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    exchange_id: i64,
) -> Result<u64> {
    let query = r"
        DELETE FROM notifications
        WHERE related_id = $1 AND type LIKE '%exchange%'
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(exchange_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to delete exchange notifications")?;
    Ok(result.rows_affected())
}
