//! User administration routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::user::{self, Role, UserError, UserRow};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateUserBody {
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct SetRoleBody {
    pub role: Role,
}

/// `POST /api/users`: create an account with a role (admin only).
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<UserRow>), StatusCode> {
    let row = user::create_user(
        &state.pool,
        auth.user.role,
        &body.email,
        body.name.as_deref(),
        body.role,
        body.phone.as_deref(),
    )
    .await
    .map_err(user_error_to_status)?;
    tracing::info!(user_id = %row.id, role = row.role.as_str(), by = %auth.user.id, "user created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/users/:id`: fetch a user's public profile.
pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserRow>, StatusCode> {
    let row = user::get_user(&state.pool, user_id)
        .await
        .map_err(user_error_to_status)?;
    Ok(Json(row))
}

/// `PATCH /api/users/:id/role`: change a user's role (admin only).
pub async fn set_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SetRoleBody>,
) -> Result<Json<UserRow>, StatusCode> {
    let row = user::set_role(&state.pool, auth.user.role, user_id, body.role)
        .await
        .map_err(user_error_to_status)?;
    Ok(Json(row))
}

pub(crate) fn user_error_to_status(err: UserError) -> StatusCode {
    match err {
        UserError::NotFound(_) => StatusCode::NOT_FOUND,
        UserError::InvalidEmail => StatusCode::UNPROCESSABLE_ENTITY,
        UserError::EmailTaken => StatusCode::CONFLICT,
        UserError::Forbidden => StatusCode::FORBIDDEN,
        UserError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
