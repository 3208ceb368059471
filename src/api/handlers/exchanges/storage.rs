//! SQL storage for exchanges and the connection list.
//!
//! Handlers decide ordering of checks; this module owns the queries and the
//! race handling around the active-pair unique index.

use anyhow::anyhow;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{Instrument, debug};

use super::super::{ApiError, auth::is_unique_violation, notify};
use super::status::{ExchangeStatus, MeetingPreference};
use super::types::Connection;

/// Parties and state of one exchange, enough for authorization decisions.
pub(super) struct ExchangeRow {
    pub(super) requester_id: i64,
    pub(super) provider_id: i64,
    pub(super) status: ExchangeStatus,
}

impl ExchangeRow {
    pub(super) fn involves(&self, user_id: i64) -> bool {
        self.requester_id == user_id || self.provider_id == user_id
    }
}

pub(super) struct NewConnection<'a> {
    pub(super) provider_id: i64,
    pub(super) requested_skill_id: i64,
    pub(super) offered_skill_id: Option<i64>,
    pub(super) message: &'a str,
    pub(super) meeting_preference: MeetingPreference,
}

pub(super) enum CreateOutcome {
    Created { exchange_id: i64 },
    AlreadyConnected { exchange_id: i64 },
}

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug)]
pub(super) struct ExchangePatch {
    pub(super) status: Option<ExchangeStatus>,
    pub(super) start_date: Option<NaiveDate>,
    pub(super) end_date: Option<NaiveDate>,
    pub(super) meeting_preference: Option<MeetingPreference>,
    pub(super) message: Option<String>,
}

impl ExchangePatch {
    pub(super) fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.meeting_preference.is_none()
            && self.message.is_none()
    }
}

pub(super) enum DeleteOutcome {
    Deleted,
    Conflict,
}

pub(super) async fn user_exists(pool: &PgPool, user_id: i64) -> Result<bool, ApiError> {
    let query = "SELECT 1 FROM users WHERE user_id = $1";
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
    Ok(row.is_some())
}

pub(super) async fn skill_exists(pool: &PgPool, skill_id: i64) -> Result<bool, ApiError> {
    let query = "SELECT 1 FROM skills WHERE skill_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(skill_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.is_some())
}

/// Find the surviving exchange between two users, in either direction.
async fn active_pair_exchange(
    pool: &PgPool,
    one: i64,
    other: i64,
) -> Result<Option<i64>, ApiError> {
    let query = r"
        SELECT exchange_id
        FROM exchanges
        WHERE ((requester_id = $1 AND provider_id = $2)
            OR (requester_id = $2 AND provider_id = $1))
          AND status IN ('pending', 'accepted', 'in_progress')
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(one)
        .bind(other)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.map(|row| row.get("exchange_id")))
}

/// Create a pending exchange unless an active one already links the pair.
///
/// The pre-check is advisory; the partial unique index on active pairs is the
/// authority. Losing that race surfaces the winner as `AlreadyConnected`.
pub(super) async fn create_connection(
    pool: &PgPool,
    requester_id: i64,
    new: &NewConnection<'_>,
) -> Result<CreateOutcome, ApiError> {
    if let Some(exchange_id) = active_pair_exchange(pool, requester_id, new.provider_id).await? {
        return Ok(CreateOutcome::AlreadyConnected { exchange_id });
    }

    let query = r"
        INSERT INTO exchanges
            (requester_id, provider_id, requested_skill_id, offered_skill_id,
             message, meeting_preference)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING exchange_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let inserted = sqlx::query(query)
        .bind(requester_id)
        .bind(new.provider_id)
        .bind(new.requested_skill_id)
        .bind(new.offered_skill_id)
        .bind(new.message)
        .bind(new.meeting_preference.as_str())
        .fetch_one(pool)
        .instrument(span)
        .await;

    match inserted {
        Ok(row) => Ok(CreateOutcome::Created {
            exchange_id: row.get("exchange_id"),
        }),
        Err(err) if is_unique_violation(&err) => {
            match active_pair_exchange(pool, requester_id, new.provider_id).await? {
                Some(exchange_id) => Ok(CreateOutcome::AlreadyConnected { exchange_id }),
                None => Err(ApiError::Conflict(
                    "Connection changed concurrently. Please retry.".to_string(),
                )),
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// Insert the opening message of a fresh connection. The caller treats
/// failures as non-fatal.
pub(super) async fn insert_opening_message(
    pool: &PgPool,
    exchange_id: i64,
    sender_id: i64,
    receiver_id: i64,
    text: &str,
) -> anyhow::Result<i64> {
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

pub(super) async fn fetch_exchange(
    pool: &PgPool,
    exchange_id: i64,
) -> Result<Option<ExchangeRow>, ApiError> {
    let query = r"
        SELECT requester_id, provider_id, status
        FROM exchanges
        WHERE exchange_id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(exchange_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let status: String = row.get("status");
    let status = ExchangeStatus::parse(&status)
        .ok_or_else(|| ApiError::Database(anyhow!("unknown exchange status: {status}")))?;
    Ok(Some(ExchangeRow {
        requester_id: row.get("requester_id"),
        provider_id: row.get("provider_id"),
        status,
    }))
}

/// Apply the patch in one UPDATE, compare-and-swap on the status the caller
/// authorized against. Returns `false` when the row moved underneath us.
pub(super) async fn apply_patch(
    pool: &PgPool,
    exchange_id: i64,
    expected: ExchangeStatus,
    patch: &ExchangePatch,
) -> Result<bool, ApiError> {
    let query = r"
        UPDATE exchanges
        SET status = COALESCE($3, status),
            start_date = COALESCE($4, start_date),
            end_date = COALESCE($5, end_date),
            meeting_preference = COALESCE($6, meeting_preference),
            message = COALESCE($7, message),
            completed_at = CASE WHEN $3 = 'completed' THEN NOW() ELSE completed_at END,
            updated_at = NOW()
        WHERE exchange_id = $1
          AND status = $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(exchange_id)
        .bind(expected.as_str())
        .bind(patch.status.map(ExchangeStatus::as_str))
        .bind(patch.start_date)
        .bind(patch.end_date)
        .bind(patch.meeting_preference.map(MeetingPreference::as_str))
        .bind(patch.message.as_deref())
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Remove the exchange and its notifications in one transaction.
///
/// The delete re-checks the deletable statuses so a concurrent acceptance
/// cannot be wiped out; zero rows rolls everything back.
pub(super) async fn delete_connection(
    pool: &PgPool,
    exchange_id: i64,
) -> Result<DeleteOutcome, ApiError> {
    let mut tx = pool.begin().await?;

    let removed_notifications = notify::delete_for_exchange(&mut tx, exchange_id).await?;

    let query = r"
        DELETE FROM exchanges
        WHERE exchange_id = $1
          AND status IN ('pending', 'rejected', 'cancelled')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(exchange_id)
        .execute(&mut *tx)
        .instrument(span)
        .await?;

    if result.rows_affected() == 0 {
        let _ = tx.rollback().await;
        return Ok(DeleteOutcome::Conflict);
    }

    tx.commit().await?;
    debug!(exchange_id, removed_notifications, "Deleted exchange");
    Ok(DeleteOutcome::Deleted)
}

/// All exchanges the user participates in, pending first, newest within rank.
pub(super) async fn list_connections(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<Connection>, ApiError> {
    let query = r#"
        SELECT
            e.exchange_id,
            e.requester_id,
            e.provider_id,
            e.status,
            e.message,
            e.meeting_preference,
            to_char(e.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(e.updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at,
            to_char(e.start_date, 'YYYY-MM-DD') AS start_date,
            to_char(e.end_date, 'YYYY-MM-DD') AS end_date,
            u_req.full_name AS requester_name,
            u_req.email AS requester_email,
            u_req.rating AS requester_rating,
            LEFT(u_req.full_name, 1) AS requester_avatar,
            u_prov.full_name AS provider_name,
            u_prov.email AS provider_email,
            u_prov.rating AS provider_rating,
            LEFT(u_prov.full_name, 1) AS provider_avatar,
            s_req.skill_id AS requested_skill_id,
            s_req.skill_name AS requested_skill_name,
            sc_req.category_name AS requested_skill_category,
            s_off.skill_id AS offered_skill_id,
            s_off.skill_name AS offered_skill_name,
            sc_off.category_name AS offered_skill_category
        FROM exchanges e
        JOIN users u_req ON u_req.user_id = e.requester_id
        JOIN users u_prov ON u_prov.user_id = e.provider_id
        JOIN skills s_req ON s_req.skill_id = e.requested_skill_id
        LEFT JOIN skill_categories sc_req ON sc_req.category_id = s_req.category_id
        LEFT JOIN skills s_off ON s_off.skill_id = e.offered_skill_id
        LEFT JOIN skill_categories sc_off ON sc_off.category_id = s_off.category_id
        WHERE e.requester_id = $1 OR e.provider_id = $1
        ORDER BY
            CASE e.status
                WHEN 'pending' THEN 1
                WHEN 'accepted' THEN 2
                WHEN 'in_progress' THEN 3
                WHEN 'completed' THEN 4
                ELSE 5
            END,
            e.created_at DESC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    let connections = rows
        .into_iter()
        .map(|row| {
            let requester_id: i64 = row.get("requester_id");
            let is_requester = requester_id == user_id;
            Connection {
                exchange_id: row.get("exchange_id"),
                status: row.get("status"),
                message: row.get("message"),
                meeting_preference: row.get("meeting_preference"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                start_date: row.get("start_date"),
                end_date: row.get("end_date"),
                is_requester,
                role: if is_requester {
                    "requester".to_string()
                } else {
                    "provider".to_string()
                },
                requester_id,
                requester_name: row.get("requester_name"),
                requester_email: row.get("requester_email"),
                requester_rating: row.get("requester_rating"),
                requester_avatar: row.get("requester_avatar"),
                provider_id: row.get("provider_id"),
                provider_name: row.get("provider_name"),
                provider_email: row.get("provider_email"),
                provider_rating: row.get("provider_rating"),
                provider_avatar: row.get("provider_avatar"),
                requested_skill_id: row.get("requested_skill_id"),
                requested_skill_name: row.get("requested_skill_name"),
                requested_skill_category: row.get("requested_skill_category"),
                offered_skill_id: row.get("offered_skill_id"),
                offered_skill_name: row.get("offered_skill_name"),
                offered_skill_category: row.get("offered_skill_category"),
            }
        })
        .collect();

    Ok(connections)
}
