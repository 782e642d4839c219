//! Role-specific dashboard summaries.
//!
//! Each role gets its own shape, tagged with `persona` so clients can switch
//! on it. All figures are computed with aggregate queries; nothing here
//! mutates state.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::message;
use crate::services::now_ms;
use crate::services::payment::{self, PaymentRow, PaymentStatus, PaymentSummary};
use crate::services::user::{Actor, Role};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const RECENT_DAYS: i64 = 30;
const BRIEF_LIMIT: i64 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "persona", rename_all = "snake_case")]
pub enum Dashboard {
    Owner(OwnerDashboard),
    HouseWatcher(WatcherDashboard),
    Tenant(TenantDashboard),
    Admin(AdminDashboard),
}

/// One line about a home check, with the property name for display.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CheckBrief {
    pub id: Uuid,
    pub property_id: Uuid,
    pub property_name: String,
    pub status: String,
    pub scheduled_for: Option<i64>,
    pub completed_at: Option<i64>,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerDashboard {
    pub property_count: i64,
    pub property_management_count: i64,
    pub house_watching_count: i64,
    pub open_work_orders: i64,
    pub payments: PaymentSummary,
    pub upcoming_checks: Vec<CheckBrief>,
    pub recent_completed_checks: Vec<CheckBrief>,
    pub unread_messages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatcherDashboard {
    pub assigned_properties: i64,
    pub checks_not_started: i64,
    pub checks_in_progress: i64,
    pub checks_completed_last_30_days: i64,
    pub upcoming_checks: Vec<CheckBrief>,
    pub unread_messages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantDashboard {
    pub outstanding_cents: i64,
    pub overdue_cents: i64,
    pub next_due: Option<PaymentRow>,
    pub open_work_orders: i64,
    pub unread_messages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub users: i64,
    pub properties: i64,
    pub open_work_orders: i64,
    pub checks_in_progress: i64,
    pub overdue_payments: i64,
}

/// Start of the "recent" window ending at `now`.
#[must_use]
pub fn recent_cutoff(now: i64) -> i64 {
    now.saturating_sub(RECENT_DAYS * DAY_MS)
}

/// Earliest unpaid charge, overdue ones included.
#[must_use]
pub fn next_due(payments: &[PaymentRow]) -> Option<PaymentRow> {
    payments
        .iter()
        .filter(|p| p.status != PaymentStatus::Paid)
        .min_by_key(|p| p.due_at)
        .cloned()
}

/// Build the dashboard for the caller's role.
///
/// # Errors
///
/// Database errors.
pub async fn dashboard_for(pool: &PgPool, actor: Actor) -> Result<Dashboard, sqlx::Error> {
    let unread_messages = unread(pool, actor.id).await?;
    Ok(match actor.role {
        Role::Owner => Dashboard::Owner(owner(pool, actor.id, unread_messages).await?),
        Role::HouseWatcher => Dashboard::HouseWatcher(watcher(pool, actor.id, unread_messages).await?),
        Role::Tenant => Dashboard::Tenant(tenant(pool, actor.id, unread_messages).await?),
        Role::Admin => Dashboard::Admin(admin(pool).await?),
    })
}

async fn unread(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    match message::unread_count(pool, user_id).await {
        Ok(count) => Ok(count),
        Err(message::MessageError::Database(e)) => Err(e),
        Err(_) => Ok(0),
    }
}

async fn owner(pool: &PgPool, user_id: Uuid, unread_messages: i64) -> Result<OwnerDashboard, sqlx::Error> {
    let now = now_ms();
    let (property_count, property_management_count, house_watching_count): (i64, i64, i64) = sqlx::query_as(
        r"SELECT COUNT(*),
                 COUNT(*) FILTER (WHERE service_type = 'property_management'),
                 COUNT(*) FILTER (WHERE service_type = 'house_watching')
          FROM properties WHERE owner_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let open_work_orders: i64 = sqlx::query_scalar(
        r"SELECT COUNT(*) FROM work_orders w JOIN properties p ON p.id = w.property_id
          WHERE p.owner_id = $1 AND w.status IN ('open', 'in_progress')",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let (collected_cents, outstanding_cents, overdue_cents, overdue_count): (i64, i64, i64, i64) = sqlx::query_as(
        r"SELECT COALESCE(SUM(pay.amount_cents) FILTER (WHERE pay.paid_at IS NOT NULL), 0)::BIGINT,
                 COALESCE(SUM(pay.amount_cents) FILTER (WHERE pay.paid_at IS NULL), 0)::BIGINT,
                 COALESCE(SUM(pay.amount_cents) FILTER (WHERE pay.paid_at IS NULL AND pay.due_at < $2), 0)::BIGINT,
                 COUNT(*) FILTER (WHERE pay.paid_at IS NULL AND pay.due_at < $2)
          FROM payments pay JOIN properties p ON p.id = pay.property_id
          WHERE p.owner_id = $1",
    )
    .bind(user_id)
    .bind(now)
    .fetch_one(pool)
    .await?;

    let upcoming_checks = sqlx::query_as::<_, CheckBrief>(
        r"SELECT c.id, c.property_id, p.name AS property_name, c.status, c.scheduled_for, c.completed_at, c.condition
          FROM home_checks c JOIN properties p ON p.id = c.property_id
          WHERE p.owner_id = $1 AND c.status <> 'completed'
          ORDER BY c.scheduled_for ASC NULLS LAST LIMIT $2",
    )
    .bind(user_id)
    .bind(BRIEF_LIMIT)
    .fetch_all(pool)
    .await?;

    let recent_completed_checks = sqlx::query_as::<_, CheckBrief>(
        r"SELECT c.id, c.property_id, p.name AS property_name, c.status, c.scheduled_for, c.completed_at, c.condition
          FROM home_checks c JOIN properties p ON p.id = c.property_id
          WHERE p.owner_id = $1 AND c.status = 'completed'
          ORDER BY c.completed_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(BRIEF_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(OwnerDashboard {
        property_count,
        property_management_count,
        house_watching_count,
        open_work_orders,
        payments: PaymentSummary { collected_cents, outstanding_cents, overdue_cents, overdue_count },
        upcoming_checks,
        recent_completed_checks,
        unread_messages,
    })
}

async fn watcher(pool: &PgPool, user_id: Uuid, unread_messages: i64) -> Result<WatcherDashboard, sqlx::Error> {
    let assigned_properties: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM properties WHERE watcher_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let (checks_not_started, checks_in_progress, checks_completed_last_30_days): (i64, i64, i64) = sqlx::query_as(
        r"SELECT COUNT(*) FILTER (WHERE status = 'not_started'),
                 COUNT(*) FILTER (WHERE status = 'in_progress'),
                 COUNT(*) FILTER (WHERE status = 'completed' AND completed_at >= $2)
          FROM home_checks WHERE watcher_id = $1",
    )
    .bind(user_id)
    .bind(recent_cutoff(now_ms()))
    .fetch_one(pool)
    .await?;

    let upcoming_checks = sqlx::query_as::<_, CheckBrief>(
        r"SELECT c.id, c.property_id, p.name AS property_name, c.status, c.scheduled_for, c.completed_at, c.condition
          FROM home_checks c JOIN properties p ON p.id = c.property_id
          WHERE c.watcher_id = $1 AND c.status <> 'completed'
          ORDER BY c.scheduled_for ASC NULLS LAST LIMIT $2",
    )
    .bind(user_id)
    .bind(BRIEF_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(WatcherDashboard {
        assigned_properties,
        checks_not_started,
        checks_in_progress,
        checks_completed_last_30_days,
        upcoming_checks,
        unread_messages,
    })
}

async fn tenant(pool: &PgPool, user_id: Uuid, unread_messages: i64) -> Result<TenantDashboard, sqlx::Error> {
    let payments = match payment::list_for_user(pool, user_id).await {
        Ok(payments) => payments,
        Err(payment::PaymentError::Database(e)) => return Err(e),
        Err(_) => Vec::new(),
    };
    let summary = payment::summarize(&payments);

    let open_work_orders: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM work_orders WHERE created_by = $1 AND status IN ('open', 'in_progress')",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(TenantDashboard {
        outstanding_cents: summary.outstanding_cents,
        overdue_cents: summary.overdue_cents,
        next_due: next_due(&payments),
        open_work_orders,
        unread_messages,
    })
}

async fn admin(pool: &PgPool) -> Result<AdminDashboard, sqlx::Error> {
    let (users, properties, open_work_orders, checks_in_progress, overdue_payments): (i64, i64, i64, i64, i64) =
        sqlx::query_as(
            r"SELECT (SELECT COUNT(*) FROM users),
                     (SELECT COUNT(*) FROM properties),
                     (SELECT COUNT(*) FROM work_orders WHERE status IN ('open', 'in_progress')),
                     (SELECT COUNT(*) FROM home_checks WHERE status = 'in_progress'),
                     (SELECT COUNT(*) FROM payments WHERE paid_at IS NULL AND due_at < $1)",
        )
        .bind(now_ms())
        .fetch_one(pool)
        .await?;

    Ok(AdminDashboard { users, properties, open_work_orders, checks_in_progress, overdue_payments })
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
