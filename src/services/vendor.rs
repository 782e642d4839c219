//! Vendor directory: contractors and service providers used for work orders.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder, Row};
use uuid::Uuid;

use crate::services::user::{Actor, Role};
use crate::services::{double_option, now_ms};

#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("vendor not found: {0}")]
    NotFound(Uuid),
    #[error("only owners and admins can manage vendors")]
    Forbidden,
    #[error("invalid vendor: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct VendorRow {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub notes: String,
    pub rating: Option<i16>,
    pub created_by: Option<Uuid>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVendor {
    pub name: String,
    pub category: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub rating: Option<i16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub rating: Option<Option<i16>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorFilter {
    pub category: Option<String>,
    pub q: Option<String>,
}

const VENDOR_COLUMNS: &str = "id, name, category, phone, email, website, notes, rating, created_by, created_at";

fn row_to_vendor(row: &sqlx::postgres::PgRow) -> VendorRow {
    VendorRow {
        id: row.get("id"),
        name: row.get("name"),
        category: row.get("category"),
        phone: row.get("phone"),
        email: row.get("email"),
        website: row.get("website"),
        notes: row.get("notes"),
        rating: row.get("rating"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

fn ensure_can_manage(actor: Actor) -> Result<(), VendorError> {
    match actor.role {
        Role::Admin | Role::Owner => Ok(()),
        Role::HouseWatcher | Role::Tenant => Err(VendorError::Forbidden),
    }
}

pub(crate) fn validate_vendor(vendor: &VendorRow) -> Result<(), VendorError> {
    if vendor.name.trim().is_empty() {
        return Err(VendorError::Invalid("name must not be empty".into()));
    }
    if vendor.category.trim().is_empty() {
        return Err(VendorError::Invalid("category must not be empty".into()));
    }
    if vendor.rating.is_some_and(|r| !(1..=5).contains(&r)) {
        return Err(VendorError::Invalid("rating must be between 1 and 5".into()));
    }
    Ok(())
}

pub(crate) fn apply_patch(vendor: &mut VendorRow, patch: VendorPatch) {
    if let Some(name) = patch.name {
        vendor.name = name.trim().to_owned();
    }
    if let Some(category) = patch.category {
        vendor.category = category.trim().to_ascii_lowercase();
    }
    if let Some(phone) = patch.phone {
        vendor.phone = phone;
    }
    if let Some(email) = patch.email {
        vendor.email = email;
    }
    if let Some(website) = patch.website {
        vendor.website = website;
    }
    if let Some(notes) = patch.notes {
        vendor.notes = notes;
    }
    if let Some(rating) = patch.rating {
        vendor.rating = rating;
    }
}

/// Add a vendor to the directory.
///
/// # Errors
///
/// `Forbidden`, `Invalid`, or database.
pub async fn create_vendor(pool: &PgPool, actor: Actor, input: NewVendor) -> Result<VendorRow, VendorError> {
    ensure_can_manage(actor)?;
    let vendor = VendorRow {
        id: Uuid::new_v4(),
        name: input.name.trim().to_owned(),
        category: input.category.trim().to_ascii_lowercase(),
        phone: input.phone,
        email: input.email,
        website: input.website,
        notes: input.notes,
        rating: input.rating,
        created_by: Some(actor.id),
        created_at: now_ms(),
    };
    validate_vendor(&vendor)?;

    sqlx::query(&format!(
        "INSERT INTO vendors ({VENDOR_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    ))
    .bind(vendor.id)
    .bind(&vendor.name)
    .bind(&vendor.category)
    .bind(&vendor.phone)
    .bind(&vendor.email)
    .bind(&vendor.website)
    .bind(&vendor.notes)
    .bind(vendor.rating)
    .bind(vendor.created_by)
    .bind(vendor.created_at)
    .execute(pool)
    .await?;

    Ok(vendor)
}

/// Search the directory by category and free text, best rated first.
///
/// # Errors
///
/// Database errors.
pub async fn list_vendors(pool: &PgPool, filter: &VendorFilter) -> Result<Vec<VendorRow>, VendorError> {
    let mut builder = QueryBuilder::new(format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE TRUE"));
    if let Some(category) = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        builder.push(" AND category = ");
        builder.push_bind(category.to_ascii_lowercase());
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR notes ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    builder.push(" ORDER BY rating DESC NULLS LAST, name");

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_vendor).collect())
}

/// # Errors
///
/// `NotFound` or database.
pub async fn get_vendor(pool: &PgPool, id: Uuid) -> Result<VendorRow, VendorError> {
    let row = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(VendorError::NotFound(id))?;
    Ok(row_to_vendor(&row))
}

/// # Errors
///
/// `Forbidden`, `NotFound`, `Invalid`, or database.
pub async fn update_vendor(pool: &PgPool, actor: Actor, id: Uuid, patch: VendorPatch) -> Result<VendorRow, VendorError> {
    ensure_can_manage(actor)?;
    let mut vendor = get_vendor(pool, id).await?;
    apply_patch(&mut vendor, patch);
    validate_vendor(&vendor)?;

    sqlx::query(
        r"UPDATE vendors
          SET name = $2, category = $3, phone = $4, email = $5, website = $6, notes = $7, rating = $8
          WHERE id = $1",
    )
    .bind(vendor.id)
    .bind(&vendor.name)
    .bind(&vendor.category)
    .bind(&vendor.phone)
    .bind(&vendor.email)
    .bind(&vendor.website)
    .bind(&vendor.notes)
    .bind(vendor.rating)
    .execute(pool)
    .await?;

    Ok(vendor)
}

/// Remove a vendor; work orders keep their history with the vendor unset.
///
/// # Errors
///
/// `Forbidden`, `NotFound`, or database.
pub async fn delete_vendor(pool: &PgPool, actor: Actor, id: Uuid) -> Result<(), VendorError> {
    ensure_can_manage(actor)?;
    let result = sqlx::query("DELETE FROM vendors WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(VendorError::NotFound(id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "vendor_test.rs"]
mod tests;
