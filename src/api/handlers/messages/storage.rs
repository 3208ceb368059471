//! SQL for direct messages and conversation summaries.

use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::super::ApiError;
use super::types::{ChatMessage, ChatPeer, ConversationSummary};

pub(super) async fn fetch_peer(pool: &PgPool, user_id: i64) -> Result<Option<ChatPeer>, ApiError> {
    let query = "SELECT user_id, full_name, rating FROM users WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(|row| ChatPeer {
        user_id: row.get("user_id"),
        full_name: row.get("full_name"),
        rating: row.get("rating"),
    }))
}

/// Both directions of the conversation between the caller and one peer,
/// oldest first.
pub(super) async fn list_messages(
    pool: &PgPool,
    caller_id: i64,
    other_id: i64,
) -> Result<Vec<ChatMessage>, ApiError> {
    let query = r#"
        SELECT
            m.message_id,
            m.sender_id,
            m.receiver_id,
            m.message_text,
            m.is_read,
            to_char(m.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            m.exchange_id,
            u.full_name AS sender_name
        FROM messages m
        JOIN users u ON u.user_id = m.sender_id
        WHERE (m.sender_id = $1 AND m.receiver_id = $2)
           OR (m.sender_id = $2 AND m.receiver_id = $1)
        ORDER BY m.created_at ASC, m.message_id ASC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(caller_id)
        .bind(other_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let sender_id: i64 = row.get("sender_id");
            ChatMessage {
                message_id: row.get("message_id"),
                sender_id,
                receiver_id: row.get("receiver_id"),
                message_text: row.get("message_text"),
                is_read: row.get("is_read"),
                created_at: row.get("created_at"),
                exchange_id: row.get("exchange_id"),
                sender_name: row.get("sender_name"),
                is_own: sender_id == caller_id,
            }
        })
        .collect())
}

pub(super) async fn insert_message(
    pool: &PgPool,
    sender_id: i64,
    receiver_id: i64,
    text: &str,
    exchange_id: Option<i64>,
) -> Result<i64, ApiError> {
    let query = r"
        INSERT INTO messages (sender_id, receiver_id, message_text, exchange_id)
        VALUES ($1, $2, $3, $4)
        RETURNING message_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(sender_id)
        .bind(receiver_id)
        .bind(text)
        .bind(exchange_id)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(row.get("message_id"))
}

/// Marks everything the peer sent to the caller as read. Returns how many
/// rows flipped.
pub(super) async fn mark_read(
    pool: &PgPool,
    receiver_id: i64,
    sender_id: i64,
) -> Result<u64, ApiError> {
    let query = r"
        UPDATE messages
        SET is_read = TRUE
        WHERE receiver_id = $1 AND sender_id = $2 AND NOT is_read
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(receiver_id)
        .bind(sender_id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected())
}

/// One summary row per peer: the latest message in either direction plus the
/// count of unread messages from that peer. `DISTINCT ON` picks the newest
/// row per peer; the unread window count runs over the full partition before
/// the cut, so totals are not limited to the surviving row.
pub(super) async fn list_conversations(
    pool: &PgPool,
    caller_id: i64,
) -> Result<Vec<ConversationSummary>, ApiError> {
    let query = r#"
        SELECT other_user_id, full_name, rating, last_message, last_message_time, unread_count
        FROM (
            SELECT DISTINCT ON (other_user_id)
                CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END
                    AS other_user_id,
                u.full_name,
                u.rating,
                m.message_text AS last_message,
                to_char(m.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
                    AS last_message_time,
                COUNT(*) FILTER (WHERE m.receiver_id = $1 AND NOT m.is_read)
                    OVER (PARTITION BY
                        CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END)
                    AS unread_count,
                m.created_at
            FROM messages m
            JOIN users u
                ON u.user_id = CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END
            WHERE m.sender_id = $1 OR m.receiver_id = $1
            ORDER BY other_user_id, m.created_at DESC, m.message_id DESC
        ) latest
        ORDER BY created_at DESC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(caller_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| ConversationSummary {
            other_user_id: row.get("other_user_id"),
            full_name: row.get("full_name"),
            rating: row.get("rating"),
            last_message: row.get("last_message"),
            last_message_time: row.get("last_message_time"),
            unread_count: row.get("unread_count"),
        })
        .collect())
}
