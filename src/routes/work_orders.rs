//! Maintenance work-order routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::routes::properties::property_error_to_status;
use crate::services::maintenance::{
    self, NewWorkOrder, WorkOrderError, WorkOrderFilter, WorkOrderPatch, WorkOrderRow, WorkOrderStatus,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: WorkOrderStatus,
}

/// `GET /api/properties/:id/work-orders`: work orders on one property.
pub async fn list_for_property(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
    Query(filter): Query<WorkOrderFilter>,
) -> Result<Json<Vec<WorkOrderRow>>, StatusCode> {
    let rows = maintenance::list_for_property(&state.pool, auth.user.actor(), property_id, &filter)
        .await
        .map_err(work_order_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/properties/:id/work-orders`: file a work order.
pub async fn create_work_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
    Json(body): Json<NewWorkOrder>,
) -> Result<(StatusCode, Json<WorkOrderRow>), StatusCode> {
    let row = maintenance::create_work_order(&state.pool, auth.user.actor(), property_id, body)
        .await
        .map_err(work_order_error_to_status)?;
    tracing::info!(work_order_id = %row.id, %property_id, priority = row.priority.as_str(), "work order filed");
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/work-orders`: every work order the caller can see.
pub async fn list_visible(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<WorkOrderFilter>,
) -> Result<Json<Vec<WorkOrderRow>>, StatusCode> {
    let rows = maintenance::list_visible(&state.pool, auth.user.actor(), &filter)
        .await
        .map_err(work_order_error_to_status)?;
    Ok(Json(rows))
}

/// `GET /api/work-orders/:id`: fetch one work order.
pub async fn get_work_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkOrderRow>, StatusCode> {
    let row = maintenance::get_work_order(&state.pool, auth.user.actor(), id)
        .await
        .map_err(work_order_error_to_status)?;
    Ok(Json(row))
}

/// `PATCH /api/work-orders/:id`: edit details, vendor and costs.
pub async fn update_work_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<WorkOrderPatch>,
) -> Result<Json<WorkOrderRow>, StatusCode> {
    let row = maintenance::update_work_order(&state.pool, auth.user.actor(), id, body)
        .await
        .map_err(work_order_error_to_status)?;
    Ok(Json(row))
}

/// `POST /api/work-orders/:id/status`: move through the status lifecycle.
pub async fn set_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> Result<Json<WorkOrderRow>, StatusCode> {
    let row = maintenance::set_status(&state.pool, auth.user.actor(), id, body.status)
        .await
        .map_err(work_order_error_to_status)?;
    tracing::info!(work_order_id = %id, status = row.status.as_str(), "work order status changed");
    Ok(Json(row))
}

pub(crate) fn work_order_error_to_status(err: WorkOrderError) -> StatusCode {
    match err {
        WorkOrderError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkOrderError::Property(e) => property_error_to_status(e),
        WorkOrderError::InvalidTransition { .. } => StatusCode::CONFLICT,
        WorkOrderError::VendorNotFound(_) | WorkOrderError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkOrderError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "work_orders_test.rs"]
mod tests;
