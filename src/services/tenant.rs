//! Tenant records under property-management properties.
//!
//! A tenant row may be linked to a user account; that link is what gives the
//! user the `tenant` relation to the property. Tenant-role callers only ever
//! see their own rows.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::property::{self, PropertyError, PropertyPermission, Relation, ServiceType};
use crate::services::user::Actor;
use crate::services::{double_option, now_ms};

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("tenant not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error("tenants can only be added to property-management properties")]
    WrongServiceType,
    #[error("invalid tenant: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantRow {
    pub id: Uuid,
    pub property_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub unit: Option<String>,
    pub lease_start: Option<i64>,
    pub lease_end: Option<i64>,
    pub monthly_rent_cents: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTenant {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub unit: Option<String>,
    pub lease_start: Option<i64>,
    pub lease_end: Option<i64>,
    #[serde(default)]
    pub monthly_rent_cents: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub user_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub lease_start: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub lease_end: Option<Option<i64>>,
    pub monthly_rent_cents: Option<i64>,
}

const TENANT_COLUMNS: &str =
    "id, property_id, user_id, name, email, phone, unit, lease_start, lease_end, monthly_rent_cents, created_at";

fn row_to_tenant(row: &sqlx::postgres::PgRow) -> TenantRow {
    TenantRow {
        id: row.get("id"),
        property_id: row.get("property_id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        unit: row.get("unit"),
        lease_start: row.get("lease_start"),
        lease_end: row.get("lease_end"),
        monthly_rent_cents: row.get("monthly_rent_cents"),
        created_at: row.get("created_at"),
    }
}

pub(crate) fn validate_tenant(tenant: &TenantRow) -> Result<(), TenantError> {
    if tenant.name.trim().is_empty() {
        return Err(TenantError::Invalid("name must not be empty".into()));
    }
    if tenant.monthly_rent_cents < 0 {
        return Err(TenantError::Invalid("monthly rent must not be negative".into()));
    }
    if let (Some(start), Some(end)) = (tenant.lease_start, tenant.lease_end) {
        if end < start {
            return Err(TenantError::Invalid("lease end is before lease start".into()));
        }
    }
    Ok(())
}

pub(crate) fn apply_patch(tenant: &mut TenantRow, patch: TenantPatch) {
    if let Some(user_id) = patch.user_id {
        tenant.user_id = user_id;
    }
    if let Some(name) = patch.name {
        tenant.name = name.trim().to_owned();
    }
    if let Some(email) = patch.email {
        tenant.email = email;
    }
    if let Some(phone) = patch.phone {
        tenant.phone = phone;
    }
    if let Some(unit) = patch.unit {
        tenant.unit = unit;
    }
    if let Some(lease_start) = patch.lease_start {
        tenant.lease_start = lease_start;
    }
    if let Some(lease_end) = patch.lease_end {
        tenant.lease_end = lease_end;
    }
    if let Some(rent) = patch.monthly_rent_cents {
        tenant.monthly_rent_cents = rent;
    }
}

async fn ensure_user_exists(pool: &PgPool, user_id: Option<Uuid>) -> Result<(), TenantError> {
    let Some(user_id) = user_id else {
        return Ok(());
    };
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(TenantError::Invalid("linked user does not exist".into()))
    }
}

/// Add a tenant to a property-management property. Requires `Manage`.
///
/// # Errors
///
/// Access errors, `WrongServiceType`, `Invalid`, or database.
pub async fn create_tenant(
    pool: &PgPool,
    actor: Actor,
    property_id: Uuid,
    input: NewTenant,
) -> Result<TenantRow, TenantError> {
    let (property, _) = property::ensure_property_permission(pool, property_id, actor, PropertyPermission::Manage).await?;
    if property.service_type != ServiceType::PropertyManagement {
        return Err(TenantError::WrongServiceType);
    }

    let tenant = TenantRow {
        id: Uuid::new_v4(),
        property_id,
        user_id: input.user_id,
        name: input.name.trim().to_owned(),
        email: input.email,
        phone: input.phone,
        unit: input.unit,
        lease_start: input.lease_start,
        lease_end: input.lease_end,
        monthly_rent_cents: input.monthly_rent_cents,
        created_at: now_ms(),
    };
    validate_tenant(&tenant)?;
    ensure_user_exists(pool, tenant.user_id).await?;

    sqlx::query(&format!(
        "INSERT INTO tenants ({TENANT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
    ))
    .bind(tenant.id)
    .bind(tenant.property_id)
    .bind(tenant.user_id)
    .bind(&tenant.name)
    .bind(&tenant.email)
    .bind(&tenant.phone)
    .bind(&tenant.unit)
    .bind(tenant.lease_start)
    .bind(tenant.lease_end)
    .bind(tenant.monthly_rent_cents)
    .bind(tenant.created_at)
    .execute(pool)
    .await?;

    tracing::info!(tenant_id = %tenant.id, %property_id, "tenant created");
    Ok(tenant)
}

/// List a property's tenants. Tenant callers see only their own rows.
///
/// # Errors
///
/// Access errors or database.
pub async fn list_tenants(pool: &PgPool, actor: Actor, property_id: Uuid) -> Result<Vec<TenantRow>, TenantError> {
    let (_, relation) = property::ensure_property_permission(pool, property_id, actor, PropertyPermission::View).await?;
    let rows = sqlx::query(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE property_id = $1 ORDER BY name, created_at"
    ))
    .bind(property_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(row_to_tenant)
        .filter(|t| relation != Relation::Tenant || t.user_id == Some(actor.id))
        .collect())
}

async fn load_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<TenantRow, TenantError> {
    let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"))
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or(TenantError::NotFound(tenant_id))?;
    Ok(row_to_tenant(&row))
}

/// Fetch one tenant. Requires `View`; tenant callers only see themselves.
///
/// # Errors
///
/// `NotFound`, access errors, or database.
pub async fn get_tenant(pool: &PgPool, actor: Actor, tenant_id: Uuid) -> Result<TenantRow, TenantError> {
    let tenant = load_tenant(pool, tenant_id).await?;
    let (_, relation) =
        property::ensure_property_permission(pool, tenant.property_id, actor, PropertyPermission::View).await?;
    if relation == Relation::Tenant && tenant.user_id != Some(actor.id) {
        return Err(TenantError::NotFound(tenant_id));
    }
    Ok(tenant)
}

/// Apply a partial update. Requires `Manage`.
///
/// # Errors
///
/// `NotFound`, access errors, `Invalid`, or database.
pub async fn update_tenant(
    pool: &PgPool,
    actor: Actor,
    tenant_id: Uuid,
    patch: TenantPatch,
) -> Result<TenantRow, TenantError> {
    let mut tenant = load_tenant(pool, tenant_id).await?;
    property::ensure_property_permission(pool, tenant.property_id, actor, PropertyPermission::Manage).await?;

    let relinked = patch.user_id.is_some();
    apply_patch(&mut tenant, patch);
    validate_tenant(&tenant)?;
    if relinked {
        ensure_user_exists(pool, tenant.user_id).await?;
    }

    sqlx::query(
        r"UPDATE tenants
          SET user_id = $2, name = $3, email = $4, phone = $5, unit = $6,
              lease_start = $7, lease_end = $8, monthly_rent_cents = $9
          WHERE id = $1",
    )
    .bind(tenant.id)
    .bind(tenant.user_id)
    .bind(&tenant.name)
    .bind(&tenant.email)
    .bind(&tenant.phone)
    .bind(&tenant.unit)
    .bind(tenant.lease_start)
    .bind(tenant.lease_end)
    .bind(tenant.monthly_rent_cents)
    .execute(pool)
    .await?;

    Ok(tenant)
}

/// Delete a tenant and its charges. Requires `Manage`.
///
/// # Errors
///
/// `NotFound`, access errors, or database.
pub async fn delete_tenant(pool: &PgPool, actor: Actor, tenant_id: Uuid) -> Result<(), TenantError> {
    let tenant = load_tenant(pool, tenant_id).await?;
    property::ensure_property_permission(pool, tenant.property_id, actor, PropertyPermission::Manage).await?;
    sqlx::query("DELETE FROM tenants WHERE id = $1")
        .bind(tenant_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "tenant_test.rs"]
mod tests;
