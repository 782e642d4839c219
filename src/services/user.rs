//! User accounts and roles.
//!
//! Every account has exactly one role. The role decides which dashboard the
//! user sees and is combined with per-property relations for access checks.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::email_auth::normalize_email;
use crate::services::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Owner,
    HouseWatcher,
    Tenant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Owner => "owner",
            Self::HouseWatcher => "house_watcher",
            Self::Tenant => "tenant",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            "house_watcher" => Some(Self::HouseWatcher),
            "tenant" => Some(Self::Tenant),
            _ => None,
        }
    }
}

/// The authenticated caller as seen by services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error("invalid email")]
    InvalidEmail,
    #[error("email already registered")]
    EmailTaken,
    #[error("only admins can manage users")]
    Forbidden,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub created_at: i64,
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> UserRow {
    let role: String = row.get("role");
    UserRow {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        // The column has a CHECK constraint; unknown values cannot be stored.
        role: Role::parse(&role).unwrap_or(Role::Tenant),
        phone: row.get("phone"),
        created_at: row.get("created_at"),
    }
}

/// Create an account with an explicit role. Admin only.
///
/// # Errors
///
/// `Forbidden` for non-admins, `InvalidEmail`, `EmailTaken`, or a database error.
pub async fn create_user(
    pool: &PgPool,
    actor_role: Role,
    email: &str,
    name: Option<&str>,
    role: Role,
    phone: Option<&str>,
) -> Result<UserRow, UserError> {
    if actor_role != Role::Admin {
        return Err(UserError::Forbidden);
    }
    let email = normalize_email(email).ok_or(UserError::InvalidEmail)?;
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| name_from_email(&email), str::to_owned);

    let row = sqlx::query(
        r"INSERT INTO users (email, name, role, phone, created_at)
          VALUES ($1, $2, $3, $4, $5)
          ON CONFLICT (email) DO NOTHING
          RETURNING id, email, name, role, phone, created_at",
    )
    .bind(&email)
    .bind(&name)
    .bind(role.as_str())
    .bind(phone)
    .bind(now_ms())
    .fetch_optional(pool)
    .await?
    .ok_or(UserError::EmailTaken)?;

    Ok(row_to_user(&row))
}

/// Change a user's role. Admin only.
///
/// # Errors
///
/// `Forbidden` for non-admins, `NotFound`, or a database error.
pub async fn set_role(pool: &PgPool, actor_role: Role, user_id: Uuid, role: Role) -> Result<UserRow, UserError> {
    if actor_role != Role::Admin {
        return Err(UserError::Forbidden);
    }
    let row = sqlx::query(
        "UPDATE users SET role = $2 WHERE id = $1 RETURNING id, email, name, role, phone, created_at",
    )
    .bind(user_id)
    .bind(role.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(UserError::NotFound(user_id))?;
    Ok(row_to_user(&row))
}

/// Fetch one user.
///
/// # Errors
///
/// `NotFound` or a database error.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<UserRow, UserError> {
    let row = sqlx::query("SELECT id, email, name, role, phone, created_at FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::NotFound(user_id))?;
    Ok(row_to_user(&row))
}

/// Display name derived from the local part of an email address.
#[must_use]
pub fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user")
        .to_owned()
}

#[cfg(test)]
#[path = "user_test.rs"]
mod tests;
