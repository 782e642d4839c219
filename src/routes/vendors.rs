//! Vendor directory routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::vendor::{self, NewVendor, VendorError, VendorFilter, VendorPatch, VendorRow};
use crate::state::AppState;

/// `GET /api/vendors`: search the directory by `category` and `q`.
pub async fn list_vendors(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(filter): Query<VendorFilter>,
) -> Result<Json<Vec<VendorRow>>, StatusCode> {
    let rows = vendor::list_vendors(&state.pool, &filter)
        .await
        .map_err(vendor_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/vendors`: add a vendor.
pub async fn create_vendor(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewVendor>,
) -> Result<(StatusCode, Json<VendorRow>), StatusCode> {
    let row = vendor::create_vendor(&state.pool, auth.user.actor(), body)
        .await
        .map_err(vendor_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/vendors/:id`
pub async fn get_vendor(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<VendorRow>, StatusCode> {
    let row = vendor::get_vendor(&state.pool, id)
        .await
        .map_err(vendor_error_to_status)?;
    Ok(Json(row))
}

/// `PATCH /api/vendors/:id`
pub async fn update_vendor(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<VendorPatch>,
) -> Result<Json<VendorRow>, StatusCode> {
    let row = vendor::update_vendor(&state.pool, auth.user.actor(), id, body)
        .await
        .map_err(vendor_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/vendors/:id`
pub async fn delete_vendor(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    vendor::delete_vendor(&state.pool, auth.user.actor(), id)
        .await
        .map_err(vendor_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub(crate) fn vendor_error_to_status(err: VendorError) -> StatusCode {
    match err {
        VendorError::NotFound(_) => StatusCode::NOT_FOUND,
        VendorError::Forbidden => StatusCode::FORBIDDEN,
        VendorError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        VendorError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "vendors_test.rs"]
mod tests;
