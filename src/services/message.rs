//! Direct messages between users (owners, watchers, tenants, admins).

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::now_ms;

const LIST_LIMIT: i64 = 200;
const MAX_BODY_CHARS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("message not found: {0}")]
    NotFound(Uuid),
    #[error("recipient not found: {0}")]
    RecipientNotFound(Uuid),
    #[error("invalid message: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRow {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub property_id: Option<Uuid>,
    pub subject: Option<String>,
    pub body: String,
    pub read_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub recipient_id: Uuid,
    pub property_id: Option<Uuid>,
    pub subject: Option<String>,
    pub body: String,
}

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, property_id, subject, body, read_at, created_at";

fn row_to_message(row: &sqlx::postgres::PgRow) -> MessageRow {
    MessageRow {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        recipient_id: row.get("recipient_id"),
        property_id: row.get("property_id"),
        subject: row.get("subject"),
        body: row.get("body"),
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
    }
}

/// Build the row to store, trimming text and rejecting empty or self messages.
pub(crate) fn build_message(sender_id: Uuid, input: NewMessage, now: i64) -> Result<MessageRow, MessageError> {
    if input.recipient_id == sender_id {
        return Err(MessageError::Invalid("cannot message yourself".into()));
    }
    let body = input.body.trim();
    if body.is_empty() {
        return Err(MessageError::Invalid("body must not be empty".into()));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(MessageError::Invalid("body is too long".into()));
    }
    Ok(MessageRow {
        id: Uuid::new_v4(),
        sender_id,
        recipient_id: input.recipient_id,
        property_id: input.property_id,
        subject: input.subject.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty()),
        body: body.to_owned(),
        read_at: None,
        created_at: now,
    })
}

/// Send a message.
///
/// # Errors
///
/// `Invalid`, `RecipientNotFound`, or database.
pub async fn send_message(pool: &PgPool, sender_id: Uuid, input: NewMessage) -> Result<MessageRow, MessageError> {
    let message = build_message(sender_id, input, now_ms())?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(message.recipient_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(MessageError::RecipientNotFound(message.recipient_id));
    }

    sqlx::query(&format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"))
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(message.property_id)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(message.read_at)
        .bind(message.created_at)
        .execute(pool)
        .await?;

    tracing::debug!(message_id = %message.id, sender_id = %sender_id, recipient_id = %message.recipient_id, "message sent");
    Ok(message)
}

/// Received messages, newest first.
///
/// # Errors
///
/// Database errors.
pub async fn inbox(pool: &PgPool, user_id: Uuid, unread_only: bool) -> Result<Vec<MessageRow>, MessageError> {
    let rows = sqlx::query(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE recipient_id = $1 AND ($2 = FALSE OR read_at IS NULL)
         ORDER BY created_at DESC LIMIT $3"
    ))
    .bind(user_id)
    .bind(unread_only)
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_message).collect())
}

/// Sent messages, newest first.
///
/// # Errors
///
/// Database errors.
pub async fn sent(pool: &PgPool, user_id: Uuid) -> Result<Vec<MessageRow>, MessageError> {
    let rows = sqlx::query(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE sender_id = $1 ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(user_id)
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_message).collect())
}

/// Both directions between two users, oldest first.
///
/// # Errors
///
/// Database errors.
pub async fn conversation(pool: &PgPool, user_id: Uuid, other_id: Uuid) -> Result<Vec<MessageRow>, MessageError> {
    let rows = sqlx::query(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM (
             SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender_id = $1 AND recipient_id = $2) OR (sender_id = $2 AND recipient_id = $1)
             ORDER BY created_at DESC LIMIT $3
         ) recent ORDER BY created_at ASC"
    ))
    .bind(user_id)
    .bind(other_id)
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_message).collect())
}

/// Mark a received message read. Idempotent; keeps the first read time.
///
/// # Errors
///
/// `NotFound` if missing or not addressed to `user_id`, or database.
pub async fn mark_read(pool: &PgPool, user_id: Uuid, message_id: Uuid) -> Result<MessageRow, MessageError> {
    let row = sqlx::query(&format!(
        "UPDATE messages SET read_at = COALESCE(read_at, $3)
         WHERE id = $1 AND recipient_id = $2
         RETURNING {MESSAGE_COLUMNS}"
    ))
    .bind(message_id)
    .bind(user_id)
    .bind(now_ms())
    .fetch_optional(pool)
    .await?
    .ok_or(MessageError::NotFound(message_id))?;
    Ok(row_to_message(&row))
}

/// # Errors
///
/// Database errors.
pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, MessageError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND read_at IS NULL")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
