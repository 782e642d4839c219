//! Home-check service: scheduling, live sessions and submission.
//!
//! DESIGN
//! ======
//! Not-started and completed checks live only in Postgres. Once a check is
//! started it becomes a live session in `AppState.checks`; every mutation
//! goes through the in-memory copy, marks it dirty, and the autosave worker
//! writes it back. After a restart the first touch hydrates the session from
//! the database again.
//!
//! Submission completes a clone of the live session, writes it, and only then
//! evicts the live copy. If the write fails the live session is untouched and
//! still in progress, so the watcher can retry.
//!
//! ACCESS
//! ======
//! - read: anyone with `View` on the property, or the assigned watcher
//! - schedule / delete: `Inspect` on the property
//! - start / edit / save / submit: the assigned watcher or an admin

use serde::Deserialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::checklist::{
    CheckError, CheckStatus, CheckSummary, ChecklistItem, ChecklistSection, Condition, DetailsPatch,
    HomeCheckSession, ItemPatch,
};
use crate::services::photo::{self, PhotoError};
use crate::services::property::{self, PropertyError, PropertyPermission, ServiceType};
use crate::services::user::{Actor, Role};
use crate::services::weather::WeatherLookup;
use crate::services::{now_ms, persistence};
use crate::state::{AppState, LiveCheck};

const LIST_LIMIT: i64 = 200;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HomeCheckError {
    #[error("home check not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error("home checks can only be scheduled on house-watching properties")]
    WrongServiceType,
    #[error("assignee is not a house watcher")]
    InvalidWatcher,
    #[error("only the assigned watcher can work on this home check")]
    NotAssigned,
    #[error("home check is {0}; only not-started checks can be deleted")]
    NotDeletable(CheckStatus),
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error(transparent)]
    Photo(#[from] PhotoError),
    #[error("stored home check is unreadable: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleRequest {
    /// Defaults to the property's assigned watcher.
    pub watcher_id: Option<Uuid>,
    pub scheduled_for: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddItemRequest {
    pub category: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckFilter {
    pub status: Option<CheckStatus>,
}

const CHECK_COLUMNS: &str = "id, property_id, watcher_id, scheduled_for, status, started_at, completed_at, \
                             elapsed_seconds, duration_seconds, checklist, general_notes, weather, condition, \
                             version, created_by, created_at, updated_at";

// =============================================================================
// ACCESS
// =============================================================================

/// Whether `actor` may start, edit or submit `session`.
#[must_use]
pub fn can_work(actor: Actor, session: &HomeCheckSession) -> bool {
    actor.role == Role::Admin || session.watcher_id == Some(actor.id)
}

/// Pick the error for an actor who cannot work on the check: `NotFound` if
/// they cannot even see the property, `NotAssigned` otherwise.
async fn deny(state: &AppState, actor: Actor, property_id: Uuid) -> HomeCheckError {
    match property::ensure_property_permission(&state.pool, property_id, actor, PropertyPermission::View).await {
        Ok(_) => HomeCheckError::NotAssigned,
        Err(e) => e.into(),
    }
}

async fn ensure_can_view(state: &AppState, actor: Actor, session: &HomeCheckSession) -> Result<(), HomeCheckError> {
    if can_work(actor, session) {
        return Ok(());
    }
    property::ensure_property_permission(&state.pool, session.property_id, actor, PropertyPermission::View).await?;
    Ok(())
}

// =============================================================================
// DATABASE
// =============================================================================

fn row_to_session(row: &sqlx::postgres::PgRow) -> Result<HomeCheckSession, HomeCheckError> {
    let status: String = row.get("status");
    let condition: Option<String> = row.get("condition");
    let checklist: sqlx::types::Json<Vec<ChecklistSection>> = row
        .try_get("checklist")
        .map_err(|e| HomeCheckError::Corrupt(e.to_string()))?;

    Ok(HomeCheckSession {
        id: row.get("id"),
        property_id: row.get("property_id"),
        watcher_id: row.get("watcher_id"),
        scheduled_for: row.get("scheduled_for"),
        status: CheckStatus::parse(&status).ok_or_else(|| HomeCheckError::Corrupt(format!("status {status}")))?,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        elapsed_seconds: row.get("elapsed_seconds"),
        duration_seconds: row.get("duration_seconds"),
        checklist: checklist.0,
        general_notes: row.get("general_notes"),
        weather: row.get("weather"),
        condition: condition.as_deref().and_then(Condition::parse),
        version: row.get("version"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Load one check from Postgres.
///
/// # Errors
///
/// `Corrupt` if the stored record cannot be decoded, or database.
pub async fn load_check(pool: &PgPool, check_id: Uuid) -> Result<Option<HomeCheckSession>, HomeCheckError> {
    let row = sqlx::query(&format!("SELECT {CHECK_COLUMNS} FROM home_checks WHERE id = $1"))
        .bind(check_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_session).transpose()
}

/// Insert or overwrite the whole record. A completed row is never
/// overwritten, so a late autosave cannot reopen a submitted check; in that
/// case nothing is written and this returns `false`.
///
/// # Errors
///
/// Database errors.
pub async fn upsert_check<'e, E>(executor: E, session: &HomeCheckSession) -> Result<bool, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    let result = sqlx::query(
        r"INSERT INTO home_checks
            (id, property_id, watcher_id, scheduled_for, status, started_at, completed_at,
             elapsed_seconds, duration_seconds, checklist, general_notes, weather, condition,
             version, created_by, created_at, updated_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
          ON CONFLICT (id) DO UPDATE SET
             watcher_id = EXCLUDED.watcher_id,
             scheduled_for = EXCLUDED.scheduled_for,
             status = EXCLUDED.status,
             started_at = EXCLUDED.started_at,
             completed_at = EXCLUDED.completed_at,
             elapsed_seconds = EXCLUDED.elapsed_seconds,
             duration_seconds = EXCLUDED.duration_seconds,
             checklist = EXCLUDED.checklist,
             general_notes = EXCLUDED.general_notes,
             weather = EXCLUDED.weather,
             condition = EXCLUDED.condition,
             version = EXCLUDED.version,
             updated_at = EXCLUDED.updated_at
          WHERE home_checks.status <> 'completed'",
    )
    .bind(session.id)
    .bind(session.property_id)
    .bind(session.watcher_id)
    .bind(session.scheduled_for)
    .bind(session.status.as_str())
    .bind(session.started_at)
    .bind(session.completed_at)
    .bind(session.elapsed_seconds)
    .bind(session.duration_seconds)
    .bind(sqlx::types::Json(&session.checklist))
    .bind(&session.general_notes)
    .bind(&session.weather)
    .bind(session.condition.map(Condition::as_str))
    .bind(session.version)
    .bind(session.created_by)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// The write failed because the property (and with it the stored check) is gone.
#[must_use]
pub fn is_orphaned(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| db.is_foreign_key_violation())
}

async fn watcher_role_ok(pool: &PgPool, watcher_id: Uuid) -> Result<bool, HomeCheckError> {
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(watcher_id)
        .fetch_optional(pool)
        .await?;
    Ok(role.as_deref().and_then(Role::parse) == Some(Role::HouseWatcher))
}

/// Replace stored rows with their live copies, which are always newer.
fn overlay_live(rows: Vec<HomeCheckSession>, live: &std::collections::HashMap<Uuid, LiveCheck>, now: i64) -> Vec<HomeCheckSession> {
    rows.into_iter()
        .map(|row| {
            let mut session = live.get(&row.id).map_or(row, |l| l.session.clone());
            session.refresh_elapsed(now);
            session
        })
        .collect()
}

// =============================================================================
// LIVE SESSIONS
// =============================================================================

async fn live_snapshot(state: &AppState, check_id: Uuid) -> Option<HomeCheckSession> {
    let checks = state.checks.read().await;
    checks.get(&check_id).map(|live| live.session.clone())
}

/// Current view of a check: the live copy if there is one, else the stored row.
async fn current(state: &AppState, check_id: Uuid) -> Result<HomeCheckSession, HomeCheckError> {
    if let Some(session) = live_snapshot(state, check_id).await {
        return Ok(session);
    }
    load_check(&state.pool, check_id)
        .await?
        .ok_or(HomeCheckError::NotFound(check_id))
}

/// Make sure an in-progress check is live. Returns the stored record when
/// the check is not in progress (and therefore not editable).
///
/// The write lock is held across the load so a submit cannot evict the
/// session between the read and the insert.
async fn hydrate(state: &AppState, check_id: Uuid) -> Result<Option<HomeCheckSession>, HomeCheckError> {
    if state.checks.read().await.contains_key(&check_id) {
        return Ok(None);
    }
    let mut checks = state.checks.write().await;
    if checks.contains_key(&check_id) {
        return Ok(None);
    }
    let stored = load_check(&state.pool, check_id)
        .await?
        .ok_or(HomeCheckError::NotFound(check_id))?;
    if stored.status != CheckStatus::InProgress {
        return Ok(Some(stored));
    }
    tracing::info!(%check_id, "home check hydrated from database");
    checks.insert(check_id, LiveCheck::clean(stored));
    Ok(None)
}

/// Drop live sessions by id.
pub(crate) async fn evict(state: &AppState, check_ids: &[Uuid]) {
    if check_ids.is_empty() {
        return;
    }
    let mut checks = state.checks.write().await;
    for check_id in check_ids {
        checks.remove(check_id);
    }
}

/// Run `apply` against the live session under the write lock. The session is
/// marked dirty whenever its version moved.
async fn with_live_session<T>(
    state: &AppState,
    actor: Actor,
    check_id: Uuid,
    apply: impl FnOnce(&mut HomeCheckSession, i64) -> Result<T, CheckError>,
) -> Result<T, HomeCheckError> {
    if let Some(stored) = hydrate(state, check_id).await? {
        if !can_work(actor, &stored) {
            return Err(deny(state, actor, stored.property_id).await);
        }
        return Err(CheckError::NotEditable(stored.status).into());
    }

    let denied_property = {
        let mut checks = state.checks.write().await;
        // EDGE: evicted by a submit or property delete between hydrate and here.
        let Some(live) = checks.get_mut(&check_id) else {
            return Err(CheckError::NotEditable(CheckStatus::Completed).into());
        };
        if can_work(actor, &live.session) {
            let before = live.session.version;
            let result = apply(&mut live.session, now_ms());
            if live.session.version != before {
                live.dirty = true;
            }
            return result.map_err(Into::into);
        }
        live.session.property_id
    };
    Err(deny(state, actor, denied_property).await)
}

/// Write the live copy now, clearing its dirty flag if nothing changed
/// meanwhile. Returns `false` when the check is not live.
async fn save_live(state: &AppState, check_id: Uuid) -> Result<bool, sqlx::Error> {
    let Some(snapshot) = live_snapshot(state, check_id).await else {
        return Ok(false);
    };
    if upsert_check(&state.pool, &snapshot).await? {
        persistence::clear_flushed(state, &[(check_id, snapshot.version)]).await;
    } else {
        tracing::warn!(%check_id, "stored home check is already completed; dropping live copy");
        evict(state, &[check_id]).await;
    }
    Ok(true)
}

// =============================================================================
// WEATHER
// =============================================================================

/// Best-effort weather text for the given coordinates.
pub async fn describe_current_weather(weather: &dyn WeatherLookup, latitude: f64, longitude: f64) -> Option<String> {
    match weather.current(latitude, longitude).await {
        Ok(report) => Some(report.summary()),
        Err(e) => {
            tracing::warn!(error = %e, latitude, longitude, "weather lookup failed; continuing without it");
            None
        }
    }
}

async fn lookup_weather(state: &AppState, property_id: Uuid) -> Option<String> {
    let weather = state.weather.as_ref()?;
    let coords: Option<(Option<f64>, Option<f64>)> =
        match sqlx::query_as("SELECT latitude, longitude FROM properties WHERE id = $1")
            .bind(property_id)
            .fetch_optional(&state.pool)
            .await
        {
            Ok(coords) => coords,
            Err(e) => {
                tracing::warn!(error = %e, %property_id, "could not load property coordinates");
                return None;
            }
        };
    let (Some(latitude), Some(longitude)) = coords.unwrap_or((None, None)) else {
        return None;
    };
    describe_current_weather(&**weather, latitude, longitude).await
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Create a not-started check from the checklist template.
///
/// # Errors
///
/// Access errors, `WrongServiceType`, `InvalidWatcher`, or database.
pub async fn schedule_check(
    state: &AppState,
    actor: Actor,
    property_id: Uuid,
    request: ScheduleRequest,
) -> Result<HomeCheckSession, HomeCheckError> {
    let (property, _) =
        property::ensure_property_permission(&state.pool, property_id, actor, PropertyPermission::Inspect).await?;
    if property.service_type != ServiceType::HouseWatching {
        return Err(HomeCheckError::WrongServiceType);
    }

    let watcher_id = request.watcher_id.or(property.watcher_id);
    if let Some(watcher_id) = watcher_id {
        if !watcher_role_ok(&state.pool, watcher_id).await? {
            return Err(HomeCheckError::InvalidWatcher);
        }
    }

    let session = HomeCheckSession::schedule(
        property_id,
        watcher_id,
        request.scheduled_for,
        Some(actor.id),
        &state.template,
        now_ms(),
    );
    upsert_check(&state.pool, &session).await?;
    tracing::info!(check_id = %session.id, %property_id, watcher_id = ?watcher_id, "home check scheduled");
    Ok(session)
}

/// Checks for one property, latest first.
///
/// # Errors
///
/// Access errors, `Corrupt`, or database.
pub async fn list_for_property(
    state: &AppState,
    actor: Actor,
    property_id: Uuid,
    filter: &CheckFilter,
) -> Result<Vec<HomeCheckSession>, HomeCheckError> {
    property::ensure_property_permission(&state.pool, property_id, actor, PropertyPermission::View).await?;
    let rows = sqlx::query(&format!(
        "SELECT {CHECK_COLUMNS} FROM home_checks
         WHERE property_id = $1 AND ($2::text IS NULL OR status = $2)
         ORDER BY COALESCE(scheduled_for, created_at) DESC LIMIT $3"
    ))
    .bind(property_id)
    .bind(filter.status.map(CheckStatus::as_str))
    .bind(LIST_LIMIT)
    .fetch_all(&state.pool)
    .await?;
    let sessions = rows.iter().map(row_to_session).collect::<Result<Vec<_>, _>>()?;

    let live = state.checks.read().await;
    Ok(overlay_live(sessions, &live, now_ms()))
}

/// Checks assigned to the caller (all checks for admins), soonest first.
///
/// # Errors
///
/// `Corrupt` or database.
pub async fn list_assigned(state: &AppState, actor: Actor, filter: &CheckFilter) -> Result<Vec<HomeCheckSession>, HomeCheckError> {
    let rows = sqlx::query(&format!(
        "SELECT {CHECK_COLUMNS} FROM home_checks
         WHERE ($1 OR watcher_id = $2) AND ($3::text IS NULL OR status = $3)
         ORDER BY COALESCE(scheduled_for, created_at) ASC LIMIT $4"
    ))
    .bind(actor.role == Role::Admin)
    .bind(actor.id)
    .bind(filter.status.map(CheckStatus::as_str))
    .bind(LIST_LIMIT)
    .fetch_all(&state.pool)
    .await?;
    let sessions = rows.iter().map(row_to_session).collect::<Result<Vec<_>, _>>()?;

    let live = state.checks.read().await;
    Ok(overlay_live(sessions, &live, now_ms()))
}

/// One check with a freshly computed `elapsed_seconds`.
///
/// # Errors
///
/// `NotFound`, access errors, `Corrupt`, or database.
pub async fn get_check(state: &AppState, actor: Actor, check_id: Uuid) -> Result<HomeCheckSession, HomeCheckError> {
    let mut session = current(state, check_id).await?;
    ensure_can_view(state, actor, &session).await?;
    session.refresh_elapsed(now_ms());
    Ok(session)
}

/// Review data: progress, missing required items, counts.
///
/// # Errors
///
/// Same as `get_check`.
pub async fn summary(state: &AppState, actor: Actor, check_id: Uuid) -> Result<CheckSummary, HomeCheckError> {
    let session = current(state, check_id).await?;
    ensure_can_view(state, actor, &session).await?;
    Ok(session.summary(now_ms()))
}

/// Start the check, make it live, and attach weather text if available.
///
/// # Errors
///
/// `NotFound`, `NotAssigned`, `InvalidTransition` unless not started, or database.
pub async fn start_check(state: &AppState, actor: Actor, check_id: Uuid) -> Result<HomeCheckSession, HomeCheckError> {
    let mut session = current(state, check_id).await?;
    if !can_work(actor, &session) {
        return Err(deny(state, actor, session.property_id).await);
    }
    session.start(now_ms())?;

    {
        let mut checks = state.checks.write().await;
        // EDGE: a concurrent start already made it live.
        if checks.contains_key(&check_id) {
            return Err(CheckError::InvalidTransition { from: CheckStatus::InProgress, to: CheckStatus::InProgress }.into());
        }
        checks.insert(check_id, LiveCheck { session: session.clone(), dirty: true });
    }
    tracing::info!(%check_id, property_id = %session.property_id, user_id = %actor.id, "home check started");

    if let Some(weather) = lookup_weather(state, session.property_id).await {
        let mut checks = state.checks.write().await;
        if let Some(live) = checks.get_mut(&check_id) {
            if live.session.weather.is_none() {
                let patch = DetailsPatch { weather: Some(Some(weather)), ..DetailsPatch::default() };
                if live.session.update_details(patch, now_ms()).is_ok() {
                    live.dirty = true;
                }
            }
            session = live.session.clone();
        }
    }

    // The autosave worker retries if this write fails.
    if let Err(e) = save_live(state, check_id).await {
        tracing::warn!(error = %e, %check_id, "initial save after start failed; left for autosave");
    }
    Ok(session)
}

/// # Errors
///
/// `NotFound`, `NotAssigned`, or checklist errors.
pub async fn update_item(
    state: &AppState,
    actor: Actor,
    check_id: Uuid,
    item_id: Uuid,
    patch: ItemPatch,
) -> Result<ChecklistItem, HomeCheckError> {
    with_live_session(state, actor, check_id, |session, now| session.update_item(item_id, patch, now)).await
}

/// # Errors
///
/// `NotFound`, `NotAssigned`, or checklist errors.
pub async fn add_item(
    state: &AppState,
    actor: Actor,
    check_id: Uuid,
    request: AddItemRequest,
) -> Result<ChecklistItem, HomeCheckError> {
    with_live_session(state, actor, check_id, |session, now| {
        session.add_item(&request.category, &request.text, now)
    })
    .await
}

/// Remove a custom item and any photos attached to it.
///
/// # Errors
///
/// `NotFound`, `NotAssigned`, or checklist errors (`RequiredItem`).
pub async fn remove_item(state: &AppState, actor: Actor, check_id: Uuid, item_id: Uuid) -> Result<(), HomeCheckError> {
    let removed =
        with_live_session(state, actor, check_id, |session, now| session.remove_item(item_id, now)).await?;
    for url in &removed.photo_urls {
        if let Err(e) = photo::delete_photo_file(&state.config.photo_dir, url).await {
            tracing::warn!(error = %e, %url, "failed to delete photo of removed item");
        }
    }
    Ok(())
}

/// Update general notes, weather or condition.
///
/// # Errors
///
/// `NotFound`, `NotAssigned`, or `NotEditable`.
pub async fn update_details(
    state: &AppState,
    actor: Actor,
    check_id: Uuid,
    patch: DetailsPatch,
) -> Result<HomeCheckSession, HomeCheckError> {
    with_live_session(state, actor, check_id, |session, now| {
        session.update_details(patch, now)?;
        Ok(session.clone())
    })
    .await
}

/// Store an uploaded photo and attach it to an item.
///
/// # Errors
///
/// `NotFound`, `NotAssigned`, checklist errors, or photo validation/storage errors.
pub async fn upload_photo(
    state: &AppState,
    actor: Actor,
    check_id: Uuid,
    item_id: Uuid,
    content_type: &str,
    bytes: &[u8],
) -> Result<ChecklistItem, HomeCheckError> {
    // Fail fast before writing anything to disk.
    with_live_session(state, actor, check_id, |session, _| {
        if session.status != CheckStatus::InProgress {
            return Err(CheckError::NotEditable(session.status));
        }
        session.item(item_id).map(|_| ()).ok_or(CheckError::ItemNotFound(item_id))
    })
    .await?;

    let (photo_id, url) =
        photo::store_photo(&state.config.photo_dir, check_id, content_type, bytes, state.config.photo_max_bytes).await?;

    let attach_url = url.clone();
    let attached = with_live_session(state, actor, check_id, move |session, now| {
        session.add_photo(item_id, attach_url, now)?;
        session.item(item_id).cloned().ok_or(CheckError::ItemNotFound(item_id))
    })
    .await;

    if attached.is_err() {
        // EDGE: the check was submitted or the item removed while uploading.
        if let Err(e) = photo::delete_photo_file(&state.config.photo_dir, &url).await {
            tracing::warn!(error = %e, %url, "failed to clean up orphaned photo");
        }
    } else {
        tracing::debug!(%check_id, %item_id, %photo_id, "photo attached");
    }
    attached
}

/// Detach a photo from an item and delete its file.
///
/// # Errors
///
/// `NotFound`, `NotAssigned`, or checklist errors (`PhotoNotFound`).
pub async fn delete_photo(
    state: &AppState,
    actor: Actor,
    check_id: Uuid,
    item_id: Uuid,
    photo_id: Uuid,
) -> Result<(), HomeCheckError> {
    let url = with_live_session(state, actor, check_id, |session, now| {
        session.remove_photo(item_id, photo_id, now)
    })
    .await?;
    if let Err(e) = photo::delete_photo_file(&state.config.photo_dir, &url).await {
        tracing::warn!(error = %e, %url, "failed to delete photo file");
    }
    Ok(())
}

/// Flush the live copy immediately. A check that is not live is returned
/// as stored.
///
/// # Errors
///
/// `NotFound`, `NotAssigned`, or database errors from the write.
pub async fn save_check(state: &AppState, actor: Actor, check_id: Uuid) -> Result<HomeCheckSession, HomeCheckError> {
    let mut session = current(state, check_id).await?;
    if !can_work(actor, &session) {
        return Err(deny(state, actor, session.property_id).await);
    }
    if save_live(state, check_id).await? {
        session = current(state, check_id).await?;
    }
    session.refresh_elapsed(now_ms());
    Ok(session)
}

/// Complete the check: gate on required items, persist, then evict.
///
/// # Errors
///
/// `NotFound`, `NotAssigned`, `InvalidTransition`, `MissingRequired`, or a
/// database error (in which case the check stays in progress).
pub async fn submit_check(state: &AppState, actor: Actor, check_id: Uuid) -> Result<HomeCheckSession, HomeCheckError> {
    if let Some(stored) = hydrate(state, check_id).await? {
        if !can_work(actor, &stored) {
            return Err(deny(state, actor, stored.property_id).await);
        }
        return Err(CheckError::InvalidTransition { from: stored.status, to: CheckStatus::Completed }.into());
    }

    let Some(mut completed) = live_snapshot(state, check_id).await else {
        return Err(CheckError::NotEditable(CheckStatus::Completed).into());
    };
    if !can_work(actor, &completed) {
        return Err(deny(state, actor, completed.property_id).await);
    }
    completed.complete(now_ms())?;

    match upsert_check(&state.pool, &completed).await {
        Ok(true) => {}
        Ok(false) => {
            // EDGE: another submit already completed the stored row.
            evict(state, &[check_id]).await;
            return Err(CheckError::InvalidTransition { from: CheckStatus::Completed, to: CheckStatus::Completed }.into());
        }
        Err(e) => {
            tracing::error!(error = %e, %check_id, "home check submit failed; session stays in progress");
            return Err(e.into());
        }
    }

    evict(state, &[check_id]).await;
    tracing::info!(
        %check_id,
        property_id = %completed.property_id,
        duration_seconds = completed.duration_seconds.unwrap_or_default(),
        "home check completed"
    );
    Ok(completed)
}

/// Delete a check that has not been started.
///
/// # Errors
///
/// `NotFound`, access errors, `NotDeletable`, or database.
pub async fn delete_check(state: &AppState, actor: Actor, check_id: Uuid) -> Result<(), HomeCheckError> {
    let session = current(state, check_id).await?;
    property::ensure_property_permission(&state.pool, session.property_id, actor, PropertyPermission::Inspect).await?;
    if session.status != CheckStatus::NotStarted {
        return Err(HomeCheckError::NotDeletable(session.status));
    }

    let result = sqlx::query("DELETE FROM home_checks WHERE id = $1 AND status = 'not_started'")
        .bind(check_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        // EDGE: started between the read and the delete.
        return Err(HomeCheckError::NotDeletable(CheckStatus::InProgress));
    }
    if let Err(e) = photo::delete_check_photos(&state.config.photo_dir, check_id).await {
        tracing::warn!(error = %e, %check_id, "failed to delete photos of deleted check");
    }
    tracing::info!(%check_id, "home check deleted");
    Ok(())
}

/// Delete a property with its checks, then drop their live sessions and
/// photo directories.
///
/// # Errors
///
/// Property access errors or database.
pub async fn delete_property(state: &AppState, actor: Actor, property_id: Uuid) -> Result<(), PropertyError> {
    let check_ids = property::delete_property(&state.pool, actor, property_id).await?;

    // Runs after the rows are gone, so a concurrent hydrate either loaded
    // before the delete (and is evicted here) or finds nothing.
    let evicted = {
        let mut checks = state.checks.write().await;
        let before = checks.len();
        checks.retain(|_, live| live.session.property_id != property_id);
        before - checks.len()
    };
    for check_id in &check_ids {
        if let Err(e) = photo::delete_check_photos(&state.config.photo_dir, *check_id).await {
            tracing::warn!(error = %e, %check_id, "failed to delete photos of deleted property");
        }
    }
    tracing::info!(%property_id, checks = check_ids.len(), evicted, "property checks removed");
    Ok(())
}

#[cfg(test)]
#[path = "home_check_test.rs"]
mod tests;
