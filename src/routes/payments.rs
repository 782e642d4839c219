//! Rent charge and payment routes.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::routes::properties::property_error_to_status;
use crate::services::payment::{self, NewCharge, PayRequest, PaymentError, PaymentRow, PaymentSummary};
use crate::state::AppState;

/// `GET /api/properties/:id/payments`: charges on a property.
pub async fn list_for_property(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentRow>>, StatusCode> {
    let rows = payment::list_for_property(&state.pool, auth.user.actor(), property_id)
        .await
        .map_err(payment_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/properties/:id/payments`: create a charge for a tenant.
pub async fn create_charge(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
    Json(body): Json<NewCharge>,
) -> Result<(StatusCode, Json<PaymentRow>), StatusCode> {
    let row = payment::create_charge(&state.pool, auth.user.actor(), property_id, body)
        .await
        .map_err(payment_error_to_status)?;
    tracing::info!(payment_id = %row.id, %property_id, amount_cents = row.amount_cents, "charge created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/properties/:id/payments/summary`: collected/outstanding totals.
pub async fn property_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
) -> Result<Json<PaymentSummary>, StatusCode> {
    let summary = payment::summary_for_property(&state.pool, auth.user.actor(), property_id)
        .await
        .map_err(payment_error_to_status)?;
    Ok(Json(summary))
}

/// `GET /api/payments`: the caller's own charges as a tenant.
pub async fn list_mine(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<PaymentRow>>, StatusCode> {
    let rows = payment::list_for_user(&state.pool, auth.user.id)
        .await
        .map_err(payment_error_to_status)?;
    Ok(Json(rows))
}

/// `GET /api/payments/summary`: totals over the caller's own charges.
pub async fn my_summary(State(state): State<AppState>, auth: AuthUser) -> Result<Json<PaymentSummary>, StatusCode> {
    let summary = payment::summary_for_user(&state.pool, auth.user.id)
        .await
        .map_err(payment_error_to_status)?;
    Ok(Json(summary))
}

/// `POST /api/payments/:id/pay`: record a payment. The body is optional.
pub async fn pay(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(payment_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<PaymentRow>, StatusCode> {
    let request = parse_pay_request(&body)?;
    let row = payment::mark_paid(&state.pool, auth.user.actor(), payment_id, request)
        .await
        .map_err(payment_error_to_status)?;
    tracing::info!(%payment_id, by = %auth.user.id, "payment recorded");
    Ok(Json(row))
}

/// `DELETE /api/payments/:id`: remove an unpaid charge.
pub async fn delete_charge(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    payment::delete_charge(&state.pool, auth.user.actor(), payment_id)
        .await
        .map_err(payment_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub(crate) fn parse_pay_request(body: &[u8]) -> Result<PayRequest, StatusCode> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PayRequest::default());
    }
    serde_json::from_slice(body).map_err(|_| StatusCode::BAD_REQUEST)
}

pub(crate) fn payment_error_to_status(err: PaymentError) -> StatusCode {
    match err {
        PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::Property(e) => property_error_to_status(e),
        PaymentError::TenantNotOnProperty(_) | PaymentError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PaymentError::AlreadyPaid(_) => StatusCode::CONFLICT,
        PaymentError::Forbidden => StatusCode::FORBIDDEN,
        PaymentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "payments_test.rs"]
mod tests;
