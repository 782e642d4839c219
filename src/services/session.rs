//! Session token management.
//!
//! ARCHITECTURE
//! ============
//! HTTP auth uses long-lived random session tokens stored in `sessions`.
//! The token travels in an `HttpOnly` cookie (browser) or an
//! `Authorization: Bearer` header (mobile/photo-capture clients).

use std::fmt::Write;

use rand::Rng;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::now_ms;
use crate::services::user::{Actor, Role};

const HOUR_MS: i64 = 60 * 60 * 1000;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// User row returned from session validation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
}

impl SessionUser {
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor { id: self.id, role: self.role }
    }
}

/// Create a session for the given user, returning the token.
pub async fn create_session(pool: &PgPool, user_id: Uuid, ttl_hours: i64) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let now = now_ms();
    sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)")
        .bind(&token)
        .bind(user_id)
        .bind(now)
        .bind(now.saturating_add(ttl_hours.saturating_mul(HOUR_MS)))
        .execute(pool)
        .await?;
    Ok(token)
}

/// Validate a session token and return the associated user.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT u.id, u.email, u.name, u.role, u.phone
          FROM sessions s
          JOIN users u ON u.id = s.user_id
          WHERE s.token = $1 AND s.expires_at > $2",
    )
    .bind(token)
    .bind(now_ms())
    .fetch_optional(pool)
    .await?;

    let Some(r) = row else {
        return Ok(None);
    };
    let role: String = r.get("role");
    let Some(role) = Role::parse(&role) else {
        tracing::warn!(%role, "session user has unknown role");
        return Ok(None);
    };

    Ok(Some(SessionUser {
        id: r.get("id"),
        email: r.get("email"),
        name: r.get("name"),
        role,
        phone: r.get("phone"),
    }))
}

/// Delete a session by token.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
