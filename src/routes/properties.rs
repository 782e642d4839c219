//! Property, tenant and watcher-assignment routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::home_check;
use crate::services::property::{self, NewProperty, PropertyError, PropertyFilter, PropertyPatch, PropertyPermission, PropertyRow};
use crate::services::tenant::{self, NewTenant, TenantError, TenantPatch, TenantRow};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AssignWatcherBody {
    pub watcher_id: Option<Uuid>,
}

/// `GET /api/properties`: list properties visible to the caller.
pub async fn list_properties(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<PropertyFilter>,
) -> Result<Json<Vec<PropertyRow>>, StatusCode> {
    let rows = property::list_properties(&state.pool, auth.user.actor(), &filter)
        .await
        .map_err(property_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/properties`: create a property (owners and admins).
pub async fn create_property(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewProperty>,
) -> Result<(StatusCode, Json<PropertyRow>), StatusCode> {
    let row = property::create_property(&state.pool, auth.user.actor(), body)
        .await
        .map_err(property_error_to_status)?;
    tracing::info!(property_id = %row.id, owner_id = %row.owner_id, service_type = row.service_type.as_str(), "property created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/properties/:id`: fetch one property.
pub async fn get_property(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
) -> Result<Json<PropertyRow>, StatusCode> {
    let (row, _) =
        property::ensure_property_permission(&state.pool, property_id, auth.user.actor(), PropertyPermission::View)
            .await
            .map_err(property_error_to_status)?;
    Ok(Json(row))
}

/// `PATCH /api/properties/:id`: partial update.
pub async fn update_property(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
    Json(body): Json<PropertyPatch>,
) -> Result<Json<PropertyRow>, StatusCode> {
    let row = property::update_property(&state.pool, auth.user.actor(), property_id, body)
        .await
        .map_err(property_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/properties/:id`: delete a property and everything under it.
pub async fn delete_property(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    home_check::delete_property(&state, auth.user.actor(), property_id)
        .await
        .map_err(property_error_to_status)?;
    tracing::info!(%property_id, by = %auth.user.id, "property deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `PUT /api/properties/:id/watcher`: assign or clear the house watcher.
pub async fn assign_watcher(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
    Json(body): Json<AssignWatcherBody>,
) -> Result<Json<PropertyRow>, StatusCode> {
    let row = property::assign_watcher(&state.pool, auth.user.actor(), property_id, body.watcher_id)
        .await
        .map_err(property_error_to_status)?;
    Ok(Json(row))
}

/// `GET /api/properties/:id/tenants`: list tenants of a property.
pub async fn list_tenants(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
) -> Result<Json<Vec<TenantRow>>, StatusCode> {
    let rows = tenant::list_tenants(&state.pool, auth.user.actor(), property_id)
        .await
        .map_err(tenant_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/properties/:id/tenants`: add a tenant.
pub async fn create_tenant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
    Json(body): Json<NewTenant>,
) -> Result<(StatusCode, Json<TenantRow>), StatusCode> {
    let row = tenant::create_tenant(&state.pool, auth.user.actor(), property_id, body)
        .await
        .map_err(tenant_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/tenants/:id`: fetch one tenant.
pub async fn get_tenant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantRow>, StatusCode> {
    let row = tenant::get_tenant(&state.pool, auth.user.actor(), tenant_id)
        .await
        .map_err(tenant_error_to_status)?;
    Ok(Json(row))
}

/// `PATCH /api/tenants/:id`: partial update.
pub async fn update_tenant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(body): Json<TenantPatch>,
) -> Result<Json<TenantRow>, StatusCode> {
    let row = tenant::update_tenant(&state.pool, auth.user.actor(), tenant_id, body)
        .await
        .map_err(tenant_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/tenants/:id`: remove a tenant.
pub async fn delete_tenant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    tenant::delete_tenant(&state.pool, auth.user.actor(), tenant_id)
        .await
        .map_err(tenant_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub(crate) fn property_error_to_status(err: PropertyError) -> StatusCode {
    property_status(&err)
}

pub(crate) fn property_status(err: &PropertyError) -> StatusCode {
    match err {
        PropertyError::NotFound(_) => StatusCode::NOT_FOUND,
        PropertyError::Forbidden(_) | PropertyError::CannotCreate => StatusCode::FORBIDDEN,
        PropertyError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PropertyError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn tenant_error_to_status(err: TenantError) -> StatusCode {
    match err {
        TenantError::NotFound(_) => StatusCode::NOT_FOUND,
        TenantError::Property(e) => property_error_to_status(e),
        TenantError::WrongServiceType | TenantError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TenantError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "properties_test.rs"]
mod tests;
