//! Rent and fee charges for property-management tenants.
//!
//! DESIGN
//! ======
//! Status is never stored. It is derived from `paid_at` and `due_at` at read
//! time, so a charge becomes overdue without any background job:
//!
//! - `paid`: `paid_at` is set
//! - `overdue`: unpaid and `due_at < now`
//! - `pending`: everything else
//!
//! Summaries are computed from the same derived status.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::now_ms;
use crate::services::property::{self, PropertyError, PropertyPermission, Relation};
use crate::services::user::{Actor, Role};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error("tenant {0} does not belong to this property")]
    TenantNotOnProperty(Uuid),
    #[error("payment already recorded: {0}")]
    AlreadyPaid(Uuid),
    #[error("not allowed to pay this charge")]
    Forbidden,
    #[error("invalid payment: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
}

#[must_use]
pub fn derive_status(paid_at: Option<i64>, due_at: i64, now: i64) -> PaymentStatus {
    if paid_at.is_some() {
        PaymentStatus::Paid
    } else if due_at < now {
        PaymentStatus::Overdue
    } else {
        PaymentStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRow {
    pub id: Uuid,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub amount_cents: i64,
    pub due_at: i64,
    pub paid_at: Option<i64>,
    pub method: Option<String>,
    pub memo: Option<String>,
    pub created_at: i64,
    pub status: PaymentStatus,
    #[serde(skip)]
    pub tenant_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCharge {
    pub tenant_id: Uuid,
    pub amount_cents: i64,
    pub due_at: i64,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayRequest {
    pub method: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    pub collected_cents: i64,
    pub outstanding_cents: i64,
    pub overdue_cents: i64,
    pub overdue_count: i64,
}

/// Totals over a set of charges. `outstanding` includes overdue amounts.
#[must_use]
pub fn summarize(payments: &[PaymentRow]) -> PaymentSummary {
    payments.iter().fold(PaymentSummary::default(), |mut acc, p| {
        match p.status {
            PaymentStatus::Paid => acc.collected_cents += p.amount_cents,
            PaymentStatus::Pending => acc.outstanding_cents += p.amount_cents,
            PaymentStatus::Overdue => {
                acc.outstanding_cents += p.amount_cents;
                acc.overdue_cents += p.amount_cents;
                acc.overdue_count += 1;
            }
        }
        acc
    })
}

pub(crate) fn validate_charge(input: &NewCharge) -> Result<(), PaymentError> {
    if input.amount_cents <= 0 {
        return Err(PaymentError::Invalid("amount must be positive".into()));
    }
    if input.due_at <= 0 {
        return Err(PaymentError::Invalid("due date is required".into()));
    }
    Ok(())
}

const PAYMENT_SELECT: &str = "SELECT pay.id, pay.property_id, pay.tenant_id, pay.amount_cents, pay.due_at, \
                              pay.paid_at, pay.method, pay.memo, pay.created_at, t.user_id AS tenant_user_id \
                              FROM payments pay JOIN tenants t ON t.id = pay.tenant_id";

fn row_to_payment(row: &sqlx::postgres::PgRow, now: i64) -> PaymentRow {
    let paid_at: Option<i64> = row.get("paid_at");
    let due_at: i64 = row.get("due_at");
    PaymentRow {
        id: row.get("id"),
        property_id: row.get("property_id"),
        tenant_id: row.get("tenant_id"),
        amount_cents: row.get("amount_cents"),
        due_at,
        paid_at,
        method: row.get("method"),
        memo: row.get("memo"),
        created_at: row.get("created_at"),
        status: derive_status(paid_at, due_at, now),
        tenant_user_id: row.get("tenant_user_id"),
    }
}

async fn load_payment(pool: &PgPool, id: Uuid) -> Result<PaymentRow, PaymentError> {
    let row = sqlx::query(&format!("{PAYMENT_SELECT} WHERE pay.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(PaymentError::NotFound(id))?;
    Ok(row_to_payment(&row, now_ms()))
}

/// Create a charge for a tenant of the property. Requires `Manage`.
///
/// # Errors
///
/// Access errors, `Invalid`, `TenantNotOnProperty`, or database.
pub async fn create_charge(
    pool: &PgPool,
    actor: Actor,
    property_id: Uuid,
    input: NewCharge,
) -> Result<PaymentRow, PaymentError> {
    property::ensure_property_permission(pool, property_id, actor, PropertyPermission::Manage).await?;
    validate_charge(&input)?;

    let tenant_user_id: Option<Option<Uuid>> =
        sqlx::query_scalar("SELECT user_id FROM tenants WHERE id = $1 AND property_id = $2")
            .bind(input.tenant_id)
            .bind(property_id)
            .fetch_optional(pool)
            .await?;
    let Some(tenant_user_id) = tenant_user_id else {
        return Err(PaymentError::TenantNotOnProperty(input.tenant_id));
    };

    let now = now_ms();
    let payment = PaymentRow {
        id: Uuid::new_v4(),
        property_id,
        tenant_id: input.tenant_id,
        amount_cents: input.amount_cents,
        due_at: input.due_at,
        paid_at: None,
        method: None,
        memo: input.memo.map(|m| m.trim().to_owned()).filter(|m| !m.is_empty()),
        created_at: now,
        status: derive_status(None, input.due_at, now),
        tenant_user_id,
    };

    sqlx::query(
        r"INSERT INTO payments (id, property_id, tenant_id, amount_cents, due_at, paid_at, method, memo, created_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(payment.id)
    .bind(payment.property_id)
    .bind(payment.tenant_id)
    .bind(payment.amount_cents)
    .bind(payment.due_at)
    .bind(payment.paid_at)
    .bind(&payment.method)
    .bind(&payment.memo)
    .bind(payment.created_at)
    .execute(pool)
    .await?;

    tracing::info!(payment_id = %payment.id, %property_id, amount_cents = payment.amount_cents, "charge created");
    Ok(payment)
}

/// Charges on a property, by due date. Tenants only see their own.
///
/// # Errors
///
/// Access errors or database.
pub async fn list_for_property(pool: &PgPool, actor: Actor, property_id: Uuid) -> Result<Vec<PaymentRow>, PaymentError> {
    let (_, relation) = property::ensure_property_permission(pool, property_id, actor, PropertyPermission::View).await?;
    let rows = sqlx::query(&format!("{PAYMENT_SELECT} WHERE pay.property_id = $1 ORDER BY pay.due_at DESC"))
        .bind(property_id)
        .fetch_all(pool)
        .await?;

    let now = now_ms();
    let own_only = relation == Relation::Tenant && actor.role != Role::Admin;
    Ok(rows
        .iter()
        .map(|row| row_to_payment(row, now))
        .filter(|p| !own_only || p.tenant_user_id == Some(actor.id))
        .collect())
}

/// Charges on every tenant record linked to the caller.
///
/// # Errors
///
/// Database errors.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<PaymentRow>, PaymentError> {
    let rows = sqlx::query(&format!("{PAYMENT_SELECT} WHERE t.user_id = $1 ORDER BY pay.due_at DESC"))
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    let now = now_ms();
    Ok(rows.iter().map(|row| row_to_payment(row, now)).collect())
}

/// Record payment. The property manager or the tenant the charge belongs to
/// may pay.
///
/// # Errors
///
/// `NotFound`, `Forbidden`, `AlreadyPaid`, or database.
pub async fn mark_paid(pool: &PgPool, actor: Actor, id: Uuid, request: PayRequest) -> Result<PaymentRow, PaymentError> {
    let mut payment = load_payment(pool, id).await?;
    if payment.tenant_user_id != Some(actor.id) {
        match property::ensure_property_permission(pool, payment.property_id, actor, PropertyPermission::Manage).await {
            Ok(_) => {}
            Err(PropertyError::Forbidden(_)) => return Err(PaymentError::Forbidden),
            Err(e) => return Err(e.into()),
        }
    }
    if payment.paid_at.is_some() {
        return Err(PaymentError::AlreadyPaid(id));
    }

    let now = now_ms();
    let method = request.method.map(|m| m.trim().to_owned()).filter(|m| !m.is_empty());
    let updated = sqlx::query("UPDATE payments SET paid_at = $2, method = $3 WHERE id = $1 AND paid_at IS NULL")
        .bind(id)
        .bind(now)
        .bind(&method)
        .execute(pool)
        .await?;
    // A concurrent payment landed between the read and the write.
    if updated.rows_affected() == 0 {
        return Err(PaymentError::AlreadyPaid(id));
    }

    payment.paid_at = Some(now);
    payment.method = method;
    payment.status = PaymentStatus::Paid;
    tracing::info!(payment_id = %id, "payment recorded");
    Ok(payment)
}

/// Delete an unpaid charge. Requires `Manage`.
///
/// # Errors
///
/// `NotFound`, access errors, `AlreadyPaid`, or database.
pub async fn delete_charge(pool: &PgPool, actor: Actor, id: Uuid) -> Result<(), PaymentError> {
    let payment = load_payment(pool, id).await?;
    property::ensure_property_permission(pool, payment.property_id, actor, PropertyPermission::Manage).await?;
    if payment.paid_at.is_some() {
        return Err(PaymentError::AlreadyPaid(id));
    }
    sqlx::query("DELETE FROM payments WHERE id = $1 AND paid_at IS NULL")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Totals for one property, scoped like `list_for_property`.
///
/// # Errors
///
/// Access errors or database.
pub async fn summary_for_property(pool: &PgPool, actor: Actor, property_id: Uuid) -> Result<PaymentSummary, PaymentError> {
    let payments = list_for_property(pool, actor, property_id).await?;
    Ok(summarize(&payments))
}

/// Totals across the caller's own charges.
///
/// # Errors
///
/// Database errors.
pub async fn summary_for_user(pool: &PgPool, user_id: Uuid) -> Result<PaymentSummary, PaymentError> {
    let payments = list_for_user(pool, user_id).await?;
    Ok(summarize(&payments))
}

#[cfg(test)]
#[path = "payment_test.rs"]
mod tests;
