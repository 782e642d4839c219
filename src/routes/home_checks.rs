//! Home-check routes: scheduling, the live checklist session, photos and submission.
//!
//! Errors come back as a bare status code, except an incomplete submission,
//! which also lists the required items still open so the client can jump to
//! them.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::routes::properties::property_status;
use crate::services::checklist::{CheckError, CheckSummary, ChecklistItem, DetailsPatch, HomeCheckSession, ItemPatch};
use crate::services::home_check::{self, AddItemRequest, CheckFilter, HomeCheckError, ScheduleRequest};
use crate::services::photo::PhotoError;
use crate::state::AppState;

/// `GET /api/properties/:id/home-checks`: checks on one property.
pub async fn list_for_property(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
    Query(filter): Query<CheckFilter>,
) -> Result<Json<Vec<HomeCheckSession>>, Response> {
    let rows = home_check::list_for_property(&state, auth.user.actor(), property_id, &filter)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(rows))
}

/// `POST /api/properties/:id/home-checks`: schedule a check.
pub async fn schedule_check(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(property_id): Path<Uuid>,
    Json(body): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<HomeCheckSession>), Response> {
    let session = home_check::schedule_check(&state, auth.user.actor(), property_id, body)
        .await
        .map_err(home_check_error_response)?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /api/home-checks`: checks assigned to the caller.
pub async fn list_assigned(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<CheckFilter>,
) -> Result<Json<Vec<HomeCheckSession>>, Response> {
    let rows = home_check::list_assigned(&state, auth.user.actor(), &filter)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(rows))
}

/// `GET /api/home-checks/:id`: the full record with fresh elapsed time.
pub async fn get_check(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(check_id): Path<Uuid>,
) -> Result<Json<HomeCheckSession>, Response> {
    let session = home_check::get_check(&state, auth.user.actor(), check_id)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(session))
}

/// `PATCH /api/home-checks/:id`: general notes, weather and condition.
pub async fn update_details(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(check_id): Path<Uuid>,
    Json(body): Json<DetailsPatch>,
) -> Result<Json<HomeCheckSession>, Response> {
    let session = home_check::update_details(&state, auth.user.actor(), check_id, body)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(session))
}

/// `DELETE /api/home-checks/:id`: only while not started.
pub async fn delete_check(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(check_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, Response> {
    home_check::delete_check(&state, auth.user.actor(), check_id)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/home-checks/:id/summary`: progress and missing required items.
pub async fn summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(check_id): Path<Uuid>,
) -> Result<Json<CheckSummary>, Response> {
    let summary = home_check::summary(&state, auth.user.actor(), check_id)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(summary))
}

/// `POST /api/home-checks/:id/start`
pub async fn start_check(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(check_id): Path<Uuid>,
) -> Result<Json<HomeCheckSession>, Response> {
    let session = home_check::start_check(&state, auth.user.actor(), check_id)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(session))
}

/// `POST /api/home-checks/:id/save`: flush now instead of waiting for autosave.
pub async fn save_check(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(check_id): Path<Uuid>,
) -> Result<Json<HomeCheckSession>, Response> {
    let session = home_check::save_check(&state, auth.user.actor(), check_id)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(session))
}

/// `POST /api/home-checks/:id/submit`: complete the check.
pub async fn submit_check(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(check_id): Path<Uuid>,
) -> Result<Json<HomeCheckSession>, Response> {
    let session = home_check::submit_check(&state, auth.user.actor(), check_id)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(session))
}

/// `POST /api/home-checks/:id/items`: add a custom item.
pub async fn add_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(check_id): Path<Uuid>,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<ChecklistItem>), Response> {
    let item = home_check::add_item(&state, auth.user.actor(), check_id, body)
        .await
        .map_err(home_check_error_response)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// `PATCH /api/home-checks/:id/items/:item_id`: done flag, notes, text.
pub async fn update_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((check_id, item_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ItemPatch>,
) -> Result<Json<ChecklistItem>, Response> {
    let item = home_check::update_item(&state, auth.user.actor(), check_id, item_id, body)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(item))
}

/// `DELETE /api/home-checks/:id/items/:item_id`: remove an optional item.
pub async fn remove_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((check_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, Response> {
    home_check::remove_item(&state, auth.user.actor(), check_id, item_id)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/home-checks/:id/items/:item_id/photos`: raw image body.
pub async fn upload_photo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((check_id, item_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ChecklistItem>), Response> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response())?;
    let item = home_check::upload_photo(&state, auth.user.actor(), check_id, item_id, content_type, &body)
        .await
        .map_err(home_check_error_response)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// `DELETE /api/home-checks/:id/items/:item_id/photos/:photo_id`
pub async fn delete_photo(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((check_id, item_id, photo_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, Response> {
    home_check::delete_photo(&state, auth.user.actor(), check_id, item_id, photo_id)
        .await
        .map_err(home_check_error_response)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub(crate) fn home_check_error_to_status(err: &HomeCheckError) -> StatusCode {
    match err {
        HomeCheckError::NotFound(_) => StatusCode::NOT_FOUND,
        HomeCheckError::Property(e) => property_status(e),
        HomeCheckError::NotAssigned => StatusCode::FORBIDDEN,
        HomeCheckError::WrongServiceType | HomeCheckError::InvalidWatcher => StatusCode::UNPROCESSABLE_ENTITY,
        HomeCheckError::NotDeletable(_) => StatusCode::CONFLICT,
        HomeCheckError::Check(e) => check_error_to_status(e),
        HomeCheckError::Photo(e) => photo_error_to_status(e),
        HomeCheckError::Corrupt(_) | HomeCheckError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn check_error_to_status(err: &CheckError) -> StatusCode {
    match err {
        CheckError::InvalidTransition { .. } | CheckError::NotEditable(_) => StatusCode::CONFLICT,
        CheckError::ItemNotFound(_) | CheckError::PhotoNotFound(_) => StatusCode::NOT_FOUND,
        CheckError::RequiredItem(_) | CheckError::EmptyText | CheckError::MissingRequired(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

pub(crate) fn photo_error_to_status(err: &PhotoError) -> StatusCode {
    match err {
        PhotoError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        PhotoError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PhotoError::Empty => StatusCode::UNPROCESSABLE_ENTITY,
        PhotoError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn home_check_error_response(err: HomeCheckError) -> Response {
    let status = home_check_error_to_status(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "home check request failed");
    }
    match err {
        HomeCheckError::Check(CheckError::MissingRequired(missing)) => (
            status,
            Json(serde_json::json!({ "error": "required items incomplete", "missing": missing })),
        )
            .into_response(),
        _ => status.into_response(),
    }
}

#[cfg(test)]
#[path = "home_checks_test.rs"]
mod tests;
