//! Property service: CRUD, watcher assignment and access checks.
//!
//! DESIGN
//! ======
//! A user's relation to a property is derived from the row itself
//! (`owner_id`, `watcher_id`) plus linked tenant records. Relations map onto
//! three permission levels:
//!
//! - `View`: any relation (owner, watcher, tenant)
//! - `Inspect`: owner or assigned watcher (home checks, work orders)
//! - `Manage`: owner only (edit, tenants, payments, delete)
//!
//! Admins satisfy every permission. Users with no relation get `NotFound`
//! rather than `Forbidden` so property ids are not enumerable.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::services::{double_option, now_ms};
use crate::services::user::{Actor, Role};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("property not found: {0}")]
    NotFound(Uuid),
    #[error("forbidden on property: {0}")]
    Forbidden(Uuid),
    #[error("only owners and admins can create properties")]
    CannotCreate,
    #[error("invalid property: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    PropertyManagement,
    HouseWatching,
}

impl ServiceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PropertyManagement => "property_management",
            Self::HouseWatching => "house_watching",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "property_management" => Some(Self::PropertyManagement),
            "house_watching" => Some(Self::HouseWatching),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Owner,
    Watcher,
    Tenant,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyPermission {
    View,
    Inspect,
    Manage,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub watcher_id: Option<Uuid>,
    pub name: String,
    pub address: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub service_type: ServiceType,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    /// Admins may create on behalf of another owner.
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postal_code: String,
    pub service_type: ServiceType,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub service_type: Option<ServiceType>,
    #[serde(default, deserialize_with = "double_option")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub longitude: Option<Option<f64>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyFilter {
    pub service_type: Option<ServiceType>,
    pub q: Option<String>,
}

const PROPERTY_COLUMNS: &str = "id, owner_id, watcher_id, name, address, city, region, postal_code, \
                                service_type, latitude, longitude, notes, created_at";

// =============================================================================
// ACCESS
// =============================================================================

/// Pure permission table. Admins pass everything.
#[must_use]
pub fn relation_satisfies(role: Role, relation: Relation, permission: PropertyPermission) -> bool {
    if role == Role::Admin {
        return true;
    }
    match permission {
        PropertyPermission::View => relation != Relation::None,
        PropertyPermission::Inspect => matches!(relation, Relation::Owner | Relation::Watcher),
        PropertyPermission::Manage => relation == Relation::Owner,
    }
}

/// Strongest relation wins: owner, then watcher, then tenant.
#[must_use]
pub fn relation_of(user_id: Uuid, owner_id: Uuid, watcher_id: Option<Uuid>, is_tenant: bool) -> Relation {
    if owner_id == user_id {
        Relation::Owner
    } else if watcher_id == Some(user_id) {
        Relation::Watcher
    } else if is_tenant {
        Relation::Tenant
    } else {
        Relation::None
    }
}

/// Load the property and check `permission` for `actor`.
///
/// # Errors
///
/// `NotFound` if missing or unrelated, `Forbidden` if related but not enough.
pub async fn ensure_property_permission(
    pool: &PgPool,
    property_id: Uuid,
    actor: Actor,
    permission: PropertyPermission,
) -> Result<(PropertyRow, Relation), PropertyError> {
    let row = sqlx::query(&format!(
        "SELECT {PROPERTY_COLUMNS},
                EXISTS(SELECT 1 FROM tenants t WHERE t.property_id = p.id AND t.user_id = $2) AS is_tenant
         FROM properties p WHERE p.id = $1"
    ))
    .bind(property_id)
    .bind(actor.id)
    .fetch_optional(pool)
    .await?
    .ok_or(PropertyError::NotFound(property_id))?;

    let property = row_to_property(&row);
    let relation = relation_of(actor.id, property.owner_id, property.watcher_id, row.get("is_tenant"));

    if actor.role != Role::Admin && relation == Relation::None {
        return Err(PropertyError::NotFound(property_id));
    }
    if !relation_satisfies(actor.role, relation, permission) {
        return Err(PropertyError::Forbidden(property_id));
    }
    Ok((property, relation))
}

// =============================================================================
// CRUD
// =============================================================================

fn row_to_property(row: &sqlx::postgres::PgRow) -> PropertyRow {
    let service_type: String = row.get("service_type");
    PropertyRow {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        watcher_id: row.get("watcher_id"),
        name: row.get("name"),
        address: row.get("address"),
        city: row.get("city"),
        region: row.get("region"),
        postal_code: row.get("postal_code"),
        service_type: ServiceType::parse(&service_type).unwrap_or(ServiceType::PropertyManagement),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
    }
}

/// Reject blank names/addresses and out-of-range or half-specified coordinates.
pub(crate) fn validate_property(property: &PropertyRow) -> Result<(), PropertyError> {
    if property.name.trim().is_empty() {
        return Err(PropertyError::Invalid("name must not be empty".into()));
    }
    if property.address.trim().is_empty() {
        return Err(PropertyError::Invalid("address must not be empty".into()));
    }
    match (property.latitude, property.longitude) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(PropertyError::Invalid("coordinates out of range".into()));
            }
        }
        (None, None) => {}
        _ => return Err(PropertyError::Invalid("latitude and longitude must be set together".into())),
    }
    Ok(())
}

pub(crate) fn apply_patch(property: &mut PropertyRow, patch: PropertyPatch) {
    if let Some(name) = patch.name {
        property.name = name.trim().to_owned();
    }
    if let Some(address) = patch.address {
        property.address = address.trim().to_owned();
    }
    if let Some(city) = patch.city {
        property.city = city;
    }
    if let Some(region) = patch.region {
        property.region = region;
    }
    if let Some(postal_code) = patch.postal_code {
        property.postal_code = postal_code;
    }
    if let Some(service_type) = patch.service_type {
        property.service_type = service_type;
    }
    if let Some(latitude) = patch.latitude {
        property.latitude = latitude;
    }
    if let Some(longitude) = patch.longitude {
        property.longitude = longitude;
    }
    if let Some(notes) = patch.notes {
        property.notes = notes;
    }
}

/// Create a property. Owners create their own; admins may name an owner.
///
/// # Errors
///
/// `CannotCreate` for watchers and tenants, `Invalid` on validation failure.
pub async fn create_property(pool: &PgPool, actor: Actor, input: NewProperty) -> Result<PropertyRow, PropertyError> {
    let owner_id = match (actor.role, input.owner_id) {
        (Role::Admin, Some(owner_id)) => owner_id,
        (Role::Admin | Role::Owner, _) => actor.id,
        _ => return Err(PropertyError::CannotCreate),
    };

    let property = PropertyRow {
        id: Uuid::new_v4(),
        owner_id,
        watcher_id: None,
        name: input.name.trim().to_owned(),
        address: input.address.trim().to_owned(),
        city: input.city,
        region: input.region,
        postal_code: input.postal_code,
        service_type: input.service_type,
        latitude: input.latitude,
        longitude: input.longitude,
        notes: input.notes,
        created_at: now_ms(),
    };
    validate_property(&property)?;

    sqlx::query(&format!(
        "INSERT INTO properties ({PROPERTY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
    ))
    .bind(property.id)
    .bind(property.owner_id)
    .bind(property.watcher_id)
    .bind(&property.name)
    .bind(&property.address)
    .bind(&property.city)
    .bind(&property.region)
    .bind(&property.postal_code)
    .bind(property.service_type.as_str())
    .bind(property.latitude)
    .bind(property.longitude)
    .bind(&property.notes)
    .bind(property.created_at)
    .execute(pool)
    .await?;

    tracing::info!(property_id = %property.id, owner_id = %property.owner_id, "property created");
    Ok(property)
}

/// List properties visible to `actor`, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_properties(
    pool: &PgPool,
    actor: Actor,
    filter: &PropertyFilter,
) -> Result<Vec<PropertyRow>, PropertyError> {
    let mut builder = QueryBuilder::new(format!("SELECT {PROPERTY_COLUMNS} FROM properties p WHERE TRUE"));
    if actor.role != Role::Admin {
        builder.push(" AND (p.owner_id = ");
        builder.push_bind(actor.id);
        builder.push(" OR p.watcher_id = ");
        builder.push_bind(actor.id);
        builder.push(" OR EXISTS(SELECT 1 FROM tenants t WHERE t.property_id = p.id AND t.user_id = ");
        builder.push_bind(actor.id);
        builder.push("))");
    }
    if let Some(service_type) = filter.service_type {
        builder.push(" AND p.service_type = ");
        builder.push_bind(service_type.as_str());
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        builder.push(" AND (p.name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR p.address ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR p.city ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    builder.push(" ORDER BY p.created_at DESC");

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_property).collect())
}

/// Apply a partial update. Requires `Manage`.
///
/// # Errors
///
/// Access errors from `ensure_property_permission`, `Invalid`, or database.
pub async fn update_property(
    pool: &PgPool,
    actor: Actor,
    property_id: Uuid,
    patch: PropertyPatch,
) -> Result<PropertyRow, PropertyError> {
    let (mut property, _) = ensure_property_permission(pool, property_id, actor, PropertyPermission::Manage).await?;
    apply_patch(&mut property, patch);
    validate_property(&property)?;

    sqlx::query(
        r"UPDATE properties
          SET name = $2, address = $3, city = $4, region = $5, postal_code = $6,
              service_type = $7, latitude = $8, longitude = $9, notes = $10
          WHERE id = $1",
    )
    .bind(property.id)
    .bind(&property.name)
    .bind(&property.address)
    .bind(&property.city)
    .bind(&property.region)
    .bind(&property.postal_code)
    .bind(property.service_type.as_str())
    .bind(property.latitude)
    .bind(property.longitude)
    .bind(&property.notes)
    .execute(pool)
    .await?;

    Ok(property)
}

/// Assign or clear the house watcher. The assignee must have the watcher role.
///
/// # Errors
///
/// Access errors, `Invalid` for a non-watcher assignee, or database.
pub async fn assign_watcher(
    pool: &PgPool,
    actor: Actor,
    property_id: Uuid,
    watcher_id: Option<Uuid>,
) -> Result<PropertyRow, PropertyError> {
    let (mut property, _) = ensure_property_permission(pool, property_id, actor, PropertyPermission::Manage).await?;

    if let Some(watcher_id) = watcher_id {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(watcher_id)
            .fetch_optional(pool)
            .await?;
        if role.as_deref().and_then(Role::parse) != Some(Role::HouseWatcher) {
            return Err(PropertyError::Invalid("assignee is not a house watcher".into()));
        }
    }

    sqlx::query("UPDATE properties SET watcher_id = $2 WHERE id = $1")
        .bind(property_id)
        .bind(watcher_id)
        .execute(pool)
        .await?;
    property.watcher_id = watcher_id;
    tracing::info!(%property_id, watcher_id = ?watcher_id, "property watcher assigned");
    Ok(property)
}

/// Delete a property and everything hanging off it. Requires `Manage`.
/// Returns the ids of the home checks that went with it, so the caller can
/// drop their live sessions and photos.
///
/// # Errors
///
/// Access errors or database.
pub async fn delete_property(pool: &PgPool, actor: Actor, property_id: Uuid) -> Result<Vec<Uuid>, PropertyError> {
    ensure_property_permission(pool, property_id, actor, PropertyPermission::Manage).await?;

    let mut tx = pool.begin().await?;
    let check_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM home_checks WHERE property_id = $1 FOR UPDATE")
        .bind(property_id)
        .fetch_all(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM properties WHERE id = $1")
        .bind(property_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(check_ids)
}

#[cfg(test)]
#[path = "property_test.rs"]
mod tests;
