//! Role-specific dashboard route.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use crate::routes::auth::AuthUser;
use crate::services::dashboard::{self, Dashboard};
use crate::state::AppState;

/// `GET /api/dashboard`: summary for the caller's role.
pub async fn get_dashboard(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Dashboard>, StatusCode> {
    let dashboard = dashboard::dashboard_for(&state.pool, auth.user.actor())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %auth.user.id, "dashboard query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(dashboard))
}
