//! Maintenance work orders.
//!
//! DESIGN
//! ======
//! Status moves through a small state machine:
//!
//! ```text
//! open --> in_progress --> completed
//!   |        |   ^
//!   |        v   |
//!   +--> cancelled  (in_progress can also fall back to open)
//! ```
//!
//! `completed` and `cancelled` are terminal. Anyone who can view the
//! property may file a work order; managing it needs `Inspect`. Tenants only
//! see the orders they filed.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::services::property::{self, PropertyError, PropertyPermission, Relation};
use crate::services::user::{Actor, Role};
use crate::services::{double_option, now_ms};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WorkOrderError {
    #[error("work order not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error("cannot move work order from {from} to {to}")]
    InvalidTransition { from: WorkOrderStatus, to: WorkOrderStatus },
    #[error("vendor not found: {0}")]
    VendorNotFound(Uuid),
    #[error("invalid work order: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn can_transition(from: WorkOrderStatus, to: WorkOrderStatus) -> bool {
    use WorkOrderStatus::{Cancelled, Completed, InProgress, Open};
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Open, InProgress | Cancelled) | (InProgress, Completed | Cancelled | Open)
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkOrderRow {
    pub id: Uuid,
    pub property_id: Uuid,
    pub created_by: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub status: WorkOrderStatus,
    pub estimated_cost_cents: Option<i64>,
    pub actual_cost_cents: Option<i64>,
    pub scheduled_for: Option<i64>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkOrderRow {
    /// Move to `to`, stamping `completed_at` on completion.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the move is not allowed.
    pub fn transition(&mut self, to: WorkOrderStatus, now: i64) -> Result<(), WorkOrderError> {
        if !can_transition(self.status, to) {
            return Err(WorkOrderError::InvalidTransition { from: self.status, to });
        }
        self.status = to;
        if to == WorkOrderStatus::Completed {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkOrder {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub vendor_id: Option<Uuid>,
    pub estimated_cost_cents: Option<i64>,
    pub scheduled_for: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkOrderPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub vendor_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub estimated_cost_cents: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub actual_cost_cents: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_for: Option<Option<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkOrderFilter {
    pub status: Option<WorkOrderStatus>,
    pub priority: Option<Priority>,
}

const DEFAULT_CATEGORY: &str = "general";

const WORK_ORDER_COLUMNS: &str = "w.id, w.property_id, w.created_by, w.vendor_id, w.title, w.description, \
                                  w.category, w.priority, w.status, w.estimated_cost_cents, w.actual_cost_cents, \
                                  w.scheduled_for, w.completed_at, w.created_at, w.updated_at";

const PRIORITY_ORDER: &str = " ORDER BY CASE w.priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 \
                              WHEN 'medium' THEN 2 ELSE 3 END, w.created_at DESC";

// =============================================================================
// PURE HELPERS
// =============================================================================

fn row_to_work_order(row: &sqlx::postgres::PgRow) -> WorkOrderRow {
    let priority: String = row.get("priority");
    let status: String = row.get("status");
    WorkOrderRow {
        id: row.get("id"),
        property_id: row.get("property_id"),
        created_by: row.get("created_by"),
        vendor_id: row.get("vendor_id"),
        title: row.get("title"),
        description: row.get("description"),
        category: row.get("category"),
        priority: Priority::parse(&priority).unwrap_or_default(),
        status: WorkOrderStatus::parse(&status).unwrap_or(WorkOrderStatus::Open),
        estimated_cost_cents: row.get("estimated_cost_cents"),
        actual_cost_cents: row.get("actual_cost_cents"),
        scheduled_for: row.get("scheduled_for"),
        completed_at: row.get("completed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn validate_work_order(order: &WorkOrderRow) -> Result<(), WorkOrderError> {
    if order.title.trim().is_empty() {
        return Err(WorkOrderError::Invalid("title must not be empty".into()));
    }
    if order.estimated_cost_cents.is_some_and(|c| c < 0) || order.actual_cost_cents.is_some_and(|c| c < 0) {
        return Err(WorkOrderError::Invalid("costs must not be negative".into()));
    }
    Ok(())
}

pub(crate) fn apply_patch(order: &mut WorkOrderRow, patch: WorkOrderPatch) {
    if let Some(title) = patch.title {
        order.title = title.trim().to_owned();
    }
    if let Some(description) = patch.description {
        order.description = description;
    }
    if let Some(category) = patch.category {
        order.category = normalize_category(Some(category));
    }
    if let Some(priority) = patch.priority {
        order.priority = priority;
    }
    if let Some(vendor_id) = patch.vendor_id {
        order.vendor_id = vendor_id;
    }
    if let Some(cost) = patch.estimated_cost_cents {
        order.estimated_cost_cents = cost;
    }
    if let Some(cost) = patch.actual_cost_cents {
        order.actual_cost_cents = cost;
    }
    if let Some(scheduled_for) = patch.scheduled_for {
        order.scheduled_for = scheduled_for;
    }
}

fn normalize_category(category: Option<String>) -> String {
    category
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned())
}

fn push_filter(builder: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &WorkOrderFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND w.status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND w.priority = ");
        builder.push_bind(priority.as_str());
    }
}

// =============================================================================
// QUERIES
// =============================================================================

async fn ensure_vendor_exists(pool: &PgPool, vendor_id: Option<Uuid>) -> Result<(), WorkOrderError> {
    let Some(vendor_id) = vendor_id else {
        return Ok(());
    };
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vendors WHERE id = $1)")
        .bind(vendor_id)
        .fetch_one(pool)
        .await?;
    if exists { Ok(()) } else { Err(WorkOrderError::VendorNotFound(vendor_id)) }
}

async fn load_work_order(pool: &PgPool, id: Uuid) -> Result<WorkOrderRow, WorkOrderError> {
    let row = sqlx::query(&format!("SELECT {WORK_ORDER_COLUMNS} FROM work_orders w WHERE w.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(WorkOrderError::NotFound(id))?;
    Ok(row_to_work_order(&row))
}

/// Write the editable fields. Status is left alone and read back, so the
/// result reflects a transition that landed after our read.
async fn persist_fields(pool: &PgPool, order: &mut WorkOrderRow) -> Result<(), WorkOrderError> {
    let stored: Option<(String, Option<i64>)> = sqlx::query_as(
        r"UPDATE work_orders
          SET vendor_id = $2, title = $3, description = $4, category = $5, priority = $6,
              estimated_cost_cents = $7, actual_cost_cents = $8, scheduled_for = $9, updated_at = $10
          WHERE id = $1
          RETURNING status, completed_at",
    )
    .bind(order.id)
    .bind(order.vendor_id)
    .bind(&order.title)
    .bind(&order.description)
    .bind(&order.category)
    .bind(order.priority.as_str())
    .bind(order.estimated_cost_cents)
    .bind(order.actual_cost_cents)
    .bind(order.scheduled_for)
    .bind(order.updated_at)
    .fetch_optional(pool)
    .await?;

    let (status, completed_at) = stored.ok_or(WorkOrderError::NotFound(order.id))?;
    order.status = WorkOrderStatus::parse(&status).unwrap_or(WorkOrderStatus::Open);
    order.completed_at = completed_at;
    Ok(())
}

/// Write a status move, but only if the stored status is still `from`.
async fn persist_status(pool: &PgPool, order: &WorkOrderRow, from: WorkOrderStatus) -> Result<(), WorkOrderError> {
    let updated = sqlx::query(
        r"UPDATE work_orders SET status = $3, completed_at = $4, updated_at = $5
          WHERE id = $1 AND status = $2",
    )
    .bind(order.id)
    .bind(from.as_str())
    .bind(order.status.as_str())
    .bind(order.completed_at)
    .bind(order.updated_at)
    .execute(pool)
    .await?;

    // A concurrent move landed between the read and the write.
    if updated.rows_affected() == 0 {
        let current = load_work_order(pool, order.id).await?;
        return Err(WorkOrderError::InvalidTransition { from: current.status, to: order.status });
    }
    Ok(())
}

/// File a work order. Any relation to the property may file; tenants cannot
/// pick a vendor or set costs.
///
/// # Errors
///
/// Access errors, `Invalid`, `VendorNotFound`, or database.
pub async fn create_work_order(
    pool: &PgPool,
    actor: Actor,
    property_id: Uuid,
    input: NewWorkOrder,
) -> Result<WorkOrderRow, WorkOrderError> {
    let (_, relation) = property::ensure_property_permission(pool, property_id, actor, PropertyPermission::View).await?;
    let restricted = relation == Relation::Tenant && actor.role != Role::Admin;

    let now = now_ms();
    let order = WorkOrderRow {
        id: Uuid::new_v4(),
        property_id,
        created_by: Some(actor.id),
        vendor_id: if restricted { None } else { input.vendor_id },
        title: input.title.trim().to_owned(),
        description: input.description,
        category: normalize_category(input.category),
        priority: input.priority,
        status: WorkOrderStatus::Open,
        estimated_cost_cents: if restricted { None } else { input.estimated_cost_cents },
        actual_cost_cents: None,
        scheduled_for: input.scheduled_for,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    validate_work_order(&order)?;
    ensure_vendor_exists(pool, order.vendor_id).await?;

    sqlx::query(
        r"INSERT INTO work_orders
            (id, property_id, created_by, vendor_id, title, description, category, priority, status,
             estimated_cost_cents, actual_cost_cents, scheduled_for, completed_at, created_at, updated_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(order.id)
    .bind(order.property_id)
    .bind(order.created_by)
    .bind(order.vendor_id)
    .bind(&order.title)
    .bind(&order.description)
    .bind(&order.category)
    .bind(order.priority.as_str())
    .bind(order.status.as_str())
    .bind(order.estimated_cost_cents)
    .bind(order.actual_cost_cents)
    .bind(order.scheduled_for)
    .bind(order.completed_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(pool)
    .await?;

    tracing::info!(work_order_id = %order.id, %property_id, priority = order.priority.as_str(), "work order filed");
    Ok(order)
}

/// Work orders for one property, urgent first.
///
/// # Errors
///
/// Access errors or database.
pub async fn list_for_property(
    pool: &PgPool,
    actor: Actor,
    property_id: Uuid,
    filter: &WorkOrderFilter,
) -> Result<Vec<WorkOrderRow>, WorkOrderError> {
    let (_, relation) = property::ensure_property_permission(pool, property_id, actor, PropertyPermission::View).await?;

    let mut builder = QueryBuilder::new(format!("SELECT {WORK_ORDER_COLUMNS} FROM work_orders w WHERE w.property_id = "));
    builder.push_bind(property_id);
    if relation == Relation::Tenant && actor.role != Role::Admin {
        builder.push(" AND w.created_by = ");
        builder.push_bind(actor.id);
    }
    push_filter(&mut builder, filter);
    builder.push(PRIORITY_ORDER);

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_work_order).collect())
}

/// Every work order the caller can see across properties, urgent first.
///
/// # Errors
///
/// Database errors.
pub async fn list_visible(pool: &PgPool, actor: Actor, filter: &WorkOrderFilter) -> Result<Vec<WorkOrderRow>, WorkOrderError> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {WORK_ORDER_COLUMNS} FROM work_orders w JOIN properties p ON p.id = w.property_id WHERE TRUE"
    ));
    if actor.role != Role::Admin {
        builder.push(" AND (p.owner_id = ");
        builder.push_bind(actor.id);
        builder.push(" OR p.watcher_id = ");
        builder.push_bind(actor.id);
        builder.push(" OR w.created_by = ");
        builder.push_bind(actor.id);
        builder.push(")");
    }
    push_filter(&mut builder, filter);
    builder.push(PRIORITY_ORDER);

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_work_order).collect())
}

/// Fetch one work order.
///
/// # Errors
///
/// `NotFound`, access errors, or database.
pub async fn get_work_order(pool: &PgPool, actor: Actor, id: Uuid) -> Result<WorkOrderRow, WorkOrderError> {
    let order = load_work_order(pool, id).await?;
    let (_, relation) =
        property::ensure_property_permission(pool, order.property_id, actor, PropertyPermission::View).await?;
    if relation == Relation::Tenant && actor.role != Role::Admin && order.created_by != Some(actor.id) {
        return Err(WorkOrderError::NotFound(id));
    }
    Ok(order)
}

/// Edit fields, assign a vendor or record costs. Requires `Inspect`.
///
/// # Errors
///
/// `NotFound`, access errors, `Invalid`, `VendorNotFound`, or database.
pub async fn update_work_order(
    pool: &PgPool,
    actor: Actor,
    id: Uuid,
    patch: WorkOrderPatch,
) -> Result<WorkOrderRow, WorkOrderError> {
    let mut order = load_work_order(pool, id).await?;
    property::ensure_property_permission(pool, order.property_id, actor, PropertyPermission::Inspect).await?;

    let vendor_changed = patch.vendor_id.is_some();
    apply_patch(&mut order, patch);
    validate_work_order(&order)?;
    if vendor_changed {
        ensure_vendor_exists(pool, order.vendor_id).await?;
    }
    order.updated_at = now_ms();
    persist_fields(pool, &mut order).await?;
    Ok(order)
}

/// Move a work order to a new status. Requires `Inspect`.
///
/// # Errors
///
/// `NotFound`, access errors, `InvalidTransition`, or database.
pub async fn set_status(
    pool: &PgPool,
    actor: Actor,
    id: Uuid,
    to: WorkOrderStatus,
) -> Result<WorkOrderRow, WorkOrderError> {
    let mut order = load_work_order(pool, id).await?;
    property::ensure_property_permission(pool, order.property_id, actor, PropertyPermission::Inspect).await?;

    let from = order.status;
    order.transition(to, now_ms())?;
    persist_status(pool, &order, from).await?;
    tracing::info!(work_order_id = %id, %from, %to, "work order status changed");
    Ok(order)
}

#[cfg(test)]
#[path = "maintenance_test.rs"]
mod tests;
