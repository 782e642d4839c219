//! Direct messaging routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::auth::AuthUser;
use crate::services::message::{self, MessageError, MessageRow, NewMessage};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread: bool,
}

/// `POST /api/messages`: send a message.
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewMessage>,
) -> Result<(StatusCode, Json<MessageRow>), StatusCode> {
    let row = message::send_message(&state.pool, auth.user.id, body)
        .await
        .map_err(message_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/messages/inbox`: received messages, `?unread=true` to filter.
pub async fn inbox(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<MessageRow>>, StatusCode> {
    let rows = message::inbox(&state.pool, auth.user.id, query.unread)
        .await
        .map_err(message_error_to_status)?;
    Ok(Json(rows))
}

/// `GET /api/messages/sent`
pub async fn sent(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<MessageRow>>, StatusCode> {
    let rows = message::sent(&state.pool, auth.user.id)
        .await
        .map_err(message_error_to_status)?;
    Ok(Json(rows))
}

/// `GET /api/messages/unread-count`
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let count = message::unread_count(&state.pool, auth.user.id)
        .await
        .map_err(message_error_to_status)?;
    Ok(Json(serde_json::json!({ "count": count })))
}

/// `GET /api/messages/with/:user_id`: both directions, oldest first.
pub async fn conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(other_id): Path<Uuid>,
) -> Result<Json<Vec<MessageRow>>, StatusCode> {
    let rows = message::conversation(&state.pool, auth.user.id, other_id)
        .await
        .map_err(message_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/messages/:id/read`: mark a received message read.
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageRow>, StatusCode> {
    let row = message::mark_read(&state.pool, auth.user.id, id)
        .await
        .map_err(message_error_to_status)?;
    Ok(Json(row))
}

pub(crate) fn message_error_to_status(err: MessageError) -> StatusCode {
    match err {
        MessageError::NotFound(_) => StatusCode::NOT_FOUND,
        MessageError::RecipientNotFound(_) | MessageError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MessageError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod tests;
