//! Sign-in by emailed access code.
//!
//! A request stores only the SHA-256 of a fresh code and voids whatever code
//! was still pending for that address. Verification locks the newest pending
//! code, then either consumes it or records a miss; the fifth miss voids it.
//!
//! Unknown addresses become `owner` accounts on their first request. Admins
//! create accounts with other roles up front.

use rand::Rng;
use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::MailConfig;
use crate::services::now_ms;
use crate::services::session::bytes_to_hex;
use crate::services::user::{Role, name_from_email};

const CODE_LEN: usize = 6;
/// No 0/O or 1/I, so codes survive being read off a phone screen.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_FAILED_ATTEMPTS: i32 = 5;
const CODE_TTL_MS: i64 = 15 * 60 * 1000;
const MAIL_SUBJECT: &str = "Your house-watch sign-in code";
const MAIL_TEMPLATE: &str = include_str!("../../templates/access_code.html");

#[derive(Debug, thiserror::Error)]
pub enum EmailAuthError {
    #[error("not a valid email address")]
    InvalidEmail,
    #[error("access code is malformed")]
    InvalidCode,
    #[error("access code expired or incorrect")]
    VerificationFailed,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("email delivery failed: {0}")]
    EmailDelivery(String),
}

/// What one verification attempt does to the pending code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Accepted,
    Missed { remaining: i32 },
    Burned,
}

/// Trimmed, lowercased address with exactly one `@` and text on both sides.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => Some(email),
        _ => None,
    }
}

/// Uppercased code, or `None` if it could never have been issued.
#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_uppercase();
    let well_formed = code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b));
    well_formed.then_some(code)
}

#[must_use]
pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .take(CODE_LEN)
        .collect()
}

#[must_use]
pub fn hash_access_code(code: &str) -> String {
    bytes_to_hex(&Sha256::digest(code.as_bytes()))
}

#[must_use]
pub fn judge_attempt(stored_hash: &str, presented_hash: &str, prior_misses: i32) -> Attempt {
    if stored_hash == presented_hash {
        return Attempt::Accepted;
    }
    let misses = prior_misses + 1;
    if misses >= MAX_FAILED_ATTEMPTS {
        Attempt::Burned
    } else {
        Attempt::Missed { remaining: MAX_FAILED_ATTEMPTS - misses }
    }
}

/// Issue a fresh code for `email`, creating the account if needed.
/// Returns the normalized address and the plaintext code for delivery.
///
/// # Errors
///
/// `InvalidEmail` or database.
pub async fn request_access_code(pool: &PgPool, email: &str) -> Result<(String, String), EmailAuthError> {
    let email = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    let code = generate_access_code();
    let now = now_ms();

    let mut tx = pool.begin().await?;
    sqlx::query("INSERT INTO users (email, name, role, created_at) VALUES ($1, $2, $3, $4) ON CONFLICT (email) DO NOTHING")
        .bind(&email)
        .bind(name_from_email(&email))
        .bind(Role::Owner.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE email_login_codes SET consumed_at = $2 WHERE email = $1 AND consumed_at IS NULL")
        .bind(&email)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO email_login_codes (email, code_hash, created_at, expires_at) VALUES ($1, $2, $3, $4)")
        .bind(&email)
        .bind(hash_access_code(&code))
        .bind(now)
        .bind(now + CODE_TTL_MS)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok((email, code))
}

/// Check `code` against the newest pending code for `email` and return the
/// signed-in user's id.
///
/// # Errors
///
/// `InvalidEmail`, `InvalidCode`, `VerificationFailed` for no pending code or
/// a miss, or database.
pub async fn verify_access_code(pool: &PgPool, email: &str, code: &str) -> Result<Uuid, EmailAuthError> {
    let email = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    let code = normalize_code(code).ok_or(EmailAuthError::InvalidCode)?;
    let now = now_ms();

    let mut tx = pool.begin().await?;
    let pending: Option<(Uuid, String, i32)> = sqlx::query_as(
        r"SELECT id, code_hash, attempts FROM email_login_codes
          WHERE email = $1 AND consumed_at IS NULL AND expires_at > $2
          ORDER BY created_at DESC LIMIT 1
          FOR UPDATE",
    )
    .bind(&email)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((code_id, stored_hash, attempts)) = pending else {
        return Err(EmailAuthError::VerificationFailed);
    };

    let attempt = judge_attempt(&stored_hash, &hash_access_code(&code), attempts);
    if attempt != Attempt::Accepted {
        let burned_at = (attempt == Attempt::Burned).then_some(now);
        sqlx::query("UPDATE email_login_codes SET attempts = attempts + 1, consumed_at = $2 WHERE id = $1")
            .bind(code_id)
            .bind(burned_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        if attempt == Attempt::Burned {
            tracing::warn!(%code_id, "access code voided after repeated misses");
        }
        return Err(EmailAuthError::VerificationFailed);
    }

    sqlx::query("UPDATE email_login_codes SET consumed_at = $2 WHERE id = $1")
        .bind(code_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    let user_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&mut *tx)
        .await?;
    tx.commit().await?;

    user_id.ok_or(EmailAuthError::VerificationFailed)
}

/// # Errors
///
/// `EmailDelivery` when Resend rejects the message.
pub async fn send_access_code_email(mail: &MailConfig, to_email: &str, code: &str) -> Result<(), EmailAuthError> {
    let html = render_access_code_mail(to_email, code);
    let message = CreateEmailBaseOptions::new(&mail.from, [to_email], MAIL_SUBJECT).with_html(&html);
    Resend::new(&mail.resend_api_key)
        .emails
        .send(message)
        .await
        .map_err(|e| EmailAuthError::EmailDelivery(e.to_string()))?;
    Ok(())
}

#[must_use]
pub fn render_access_code_mail(email: &str, code: &str) -> String {
    MAIL_TEMPLATE.replace("{{EMAIL}}", email).replace("{{CODE}}", code)
}

#[cfg(test)]
#[path = "email_auth_test.rs"]
mod tests;
