use std::collections::HashMap;
use std::sync::Arc;

use super::*;
use crate::services::weather::{WeatherError, WeatherReport};
use crate::state::test_helpers;

fn watcher() -> Actor {
    Actor { id: Uuid::new_v4(), role: Role::HouseWatcher }
}

fn first_item(session: &HomeCheckSession, required: bool) -> Uuid {
    session
        .checklist
        .iter()
        .flat_map(|s| s.items.iter())
        .find(|i| i.required == required)
        .map(|i| i.id)
        .expect("template should have such an item")
}

async fn live(state: &AppState, check_id: Uuid) -> LiveCheck {
    state.checks.read().await.get(&check_id).cloned().expect("check should be live")
}

struct FixedWeather(Result<WeatherReport, ()>);

#[async_trait::async_trait]
impl WeatherLookup for FixedWeather {
    async fn current(&self, _latitude: f64, _longitude: f64) -> Result<WeatherReport, WeatherError> {
        self.0
            .clone()
            .map_err(|()| WeatherError::Response { status: 503, body: "unavailable".into() })
    }
}

// =============================================================================
// ACCESS
// =============================================================================

#[test]
fn assigned_watcher_and_admin_can_work() {
    let me = watcher();
    let session = test_helpers::dummy_session(Some(me.id));
    assert!(can_work(me, &session));
    assert!(can_work(Actor { id: Uuid::new_v4(), role: Role::Admin }, &session));
}

#[test]
fn other_users_cannot_work() {
    let session = test_helpers::dummy_session(Some(Uuid::new_v4()));
    assert!(!can_work(watcher(), &session));
    assert!(!can_work(Actor { id: Uuid::new_v4(), role: Role::Owner }, &session));

    let unassigned = test_helpers::dummy_session(None);
    assert!(!can_work(watcher(), &unassigned));
}

// =============================================================================
// LIVE MUTATIONS
// =============================================================================

#[tokio::test]
async fn update_item_marks_session_dirty() {
    let state = test_helpers::test_app_state();
    let me = watcher();
    let session = test_helpers::dummy_started_session(Some(me.id));
    let before = session.version;
    let item_id = first_item(&session, true);
    let check_id = test_helpers::seed_live_check(&state, session, false).await;

    let item = update_item(
        &state,
        me,
        check_id,
        item_id,
        ItemPatch { done: Some(true), notes: Some("Deadbolt engaged".into()), text: None },
    )
    .await
    .unwrap();

    assert!(item.done);
    assert_eq!(item.notes, "Deadbolt engaged");
    let live = live(&state, check_id).await;
    assert!(live.dirty);
    assert!(live.session.version > before);
}

#[tokio::test]
async fn failed_mutation_does_not_mark_dirty() {
    let state = test_helpers::test_app_state();
    let me = watcher();
    let session = test_helpers::dummy_started_session(Some(me.id));
    let check_id = test_helpers::seed_live_check(&state, session, false).await;

    let err = update_item(&state, me, check_id, Uuid::new_v4(), ItemPatch::default()).await.unwrap_err();
    assert!(matches!(err, HomeCheckError::Check(CheckError::ItemNotFound(_))));
    assert!(!live(&state, check_id).await.dirty);
}

#[tokio::test]
async fn admin_can_edit_any_live_check() {
    let state = test_helpers::test_app_state();
    let session = test_helpers::dummy_started_session(Some(Uuid::new_v4()));
    let check_id = test_helpers::seed_live_check(&state, session, false).await;
    let admin = Actor { id: Uuid::new_v4(), role: Role::Admin };

    let item = add_item(&state, admin, check_id, AddItemRequest { category: "Garage".into(), text: "Freezer running".into() })
        .await
        .unwrap();
    assert!(!item.required);

    let live = live(&state, check_id).await;
    assert!(live.session.checklist.iter().any(|s| s.category == "Garage"));
}

#[tokio::test]
async fn remove_required_item_is_rejected() {
    let state = test_helpers::test_app_state();
    let me = watcher();
    let session = test_helpers::dummy_started_session(Some(me.id));
    let required = first_item(&session, true);
    let check_id = test_helpers::seed_live_check(&state, session, false).await;

    let err = remove_item(&state, me, check_id, required).await.unwrap_err();
    assert!(matches!(err, HomeCheckError::Check(CheckError::RequiredItem(_))));
}

#[tokio::test]
async fn remove_optional_item() {
    let state = test_helpers::test_app_state();
    let me = watcher();
    let session = test_helpers::dummy_started_session(Some(me.id));
    let optional = first_item(&session, false);
    let check_id = test_helpers::seed_live_check(&state, session, false).await;

    remove_item(&state, me, check_id, optional).await.unwrap();
    assert!(live(&state, check_id).await.session.item(optional).is_none());
}

#[tokio::test]
async fn update_details_sets_condition_and_notes() {
    let state = test_helpers::test_app_state();
    let me = watcher();
    let session = test_helpers::dummy_started_session(Some(me.id));
    let check_id = test_helpers::seed_live_check(&state, session, false).await;

    let patch: DetailsPatch =
        serde_json::from_str(r#"{"general_notes": "All quiet", "condition": "needs_attention"}"#).unwrap();
    let updated = update_details(&state, me, check_id, patch).await.unwrap();
    assert_eq!(updated.general_notes, "All quiet");
    assert_eq!(updated.condition, Some(Condition::NeedsAttention));
}

// =============================================================================
// PHOTOS
// =============================================================================

fn state_with_photo_dir() -> (AppState, std::path::PathBuf) {
    let mut state = test_helpers::test_app_state();
    let dir = std::env::temp_dir().join(format!("housewatch-check-photos-{}", Uuid::new_v4()));
    let mut config = (*state.config).clone();
    config.photo_dir = dir.clone();
    config.photo_max_bytes = 64;
    state.config = Arc::new(config);
    (state, dir)
}

#[tokio::test]
async fn upload_and_delete_photo() {
    let (state, dir) = state_with_photo_dir();
    let me = watcher();
    let session = test_helpers::dummy_started_session(Some(me.id));
    let item_id = first_item(&session, false);
    let check_id = test_helpers::seed_live_check(&state, session, false).await;

    let item = upload_photo(&state, me, check_id, item_id, "image/jpeg", b"\xFF\xD8\xFF fake jpeg").await.unwrap();
    assert_eq!(item.photo_urls.len(), 1);
    let url = item.photo_urls[0].clone();
    let path = photo::path_for_url(&dir, &url).unwrap();
    assert!(path.exists());

    let photo_id: Uuid = path.file_stem().unwrap().to_str().unwrap().parse().unwrap();
    delete_photo(&state, me, check_id, item_id, photo_id).await.unwrap();
    assert!(!path.exists());
    assert!(live(&state, check_id).await.session.item(item_id).unwrap().photo_urls.is_empty());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn upload_rejects_oversized_photo_without_touching_session() {
    let (state, dir) = state_with_photo_dir();
    let me = watcher();
    let session = test_helpers::dummy_started_session(Some(me.id));
    let item_id = first_item(&session, false);
    let version = session.version;
    let check_id = test_helpers::seed_live_check(&state, session, false).await;

    let err = upload_photo(&state, me, check_id, item_id, "image/png", &[0u8; 65]).await.unwrap_err();
    assert!(matches!(err, HomeCheckError::Photo(PhotoError::TooLarge { .. })));
    assert_eq!(live(&state, check_id).await.session.version, version);
    assert!(!dir.exists());
}

#[tokio::test]
async fn upload_to_unknown_item_fails_before_storage() {
    let (state, dir) = state_with_photo_dir();
    let me = watcher();
    let session = test_helpers::dummy_started_session(Some(me.id));
    let check_id = test_helpers::seed_live_check(&state, session, false).await;

    let err = upload_photo(&state, me, check_id, Uuid::new_v4(), "image/png", b"png").await.unwrap_err();
    assert!(matches!(err, HomeCheckError::Check(CheckError::ItemNotFound(_))));
    assert!(!dir.exists());
}

// =============================================================================
// SUBMIT
// =============================================================================

#[tokio::test]
async fn submit_with_missing_required_stays_live() {
    let state = test_helpers::test_app_state();
    let me = watcher();
    let session = test_helpers::dummy_started_session(Some(me.id));
    let check_id = test_helpers::seed_live_check(&state, session, false).await;

    let err = submit_check(&state, me, check_id).await.unwrap_err();
    let HomeCheckError::Check(CheckError::MissingRequired(missing)) = err else {
        panic!("expected MissingRequired, got {err:?}");
    };
    assert!(!missing.is_empty());
    assert_eq!(live(&state, check_id).await.session.status, CheckStatus::InProgress);
}

#[tokio::test]
async fn submit_write_failure_leaves_check_in_progress() {
    let state = test_helpers::test_app_state();
    let me = watcher();
    let mut session = test_helpers::dummy_started_session(Some(me.id));
    let required: Vec<Uuid> = session
        .checklist
        .iter()
        .flat_map(|s| s.items.iter())
        .filter(|i| i.required)
        .map(|i| i.id)
        .collect();
    for id in required {
        session
            .update_item(id, ItemPatch { done: Some(true), ..ItemPatch::default() }, 1_700_000_001_000)
            .unwrap();
    }
    let check_id = test_helpers::seed_live_check(&state, session, true).await;

    // Test state uses connect_lazy; the completion write fails.
    let err = submit_check(&state, me, check_id).await.unwrap_err();
    assert!(matches!(err, HomeCheckError::Database(_)));

    let live = live(&state, check_id).await;
    assert_eq!(live.session.status, CheckStatus::InProgress);
    assert!(live.session.completed_at.is_none());
    assert!(live.dirty);
}

// =============================================================================
// WEATHER + LISTING
// =============================================================================

#[tokio::test]
async fn weather_success_is_formatted() {
    let lookup = FixedWeather(Ok(WeatherReport { description: "Partly cloudy".into(), temperature_c: 21.5 }));
    assert_eq!(describe_current_weather(&lookup, 26.1, -81.8).await.as_deref(), Some("Partly cloudy, 21.5°C"));
}

#[tokio::test]
async fn weather_failure_is_swallowed() {
    let lookup = FixedWeather(Err(()));
    assert_eq!(describe_current_weather(&lookup, 26.1, -81.8).await, None);
}

#[test]
fn connection_failures_are_not_orphaned() {
    assert!(!is_orphaned(&sqlx::Error::RowNotFound));
    assert!(!is_orphaned(&sqlx::Error::PoolTimedOut));
}

#[tokio::test]
async fn evict_removes_only_named_checks() {
    let state = test_helpers::test_app_state();
    let gone = test_helpers::seed_live_check(&state, test_helpers::dummy_started_session(None), true).await;
    let kept = test_helpers::seed_live_check(&state, test_helpers::dummy_started_session(None), true).await;

    evict(&state, &[gone, Uuid::new_v4()]).await;

    let checks = state.checks.read().await;
    assert!(!checks.contains_key(&gone));
    assert!(checks.contains_key(&kept));
}

#[test]
fn overlay_prefers_live_copy() {
    let stored = test_helpers::dummy_session(None);
    let mut newer = stored.clone();
    newer.start(1_700_000_000_000).unwrap();
    let other = test_helpers::dummy_session(None);

    let mut live_map = HashMap::new();
    live_map.insert(newer.id, LiveCheck::clean(newer));

    let merged = overlay_live(vec![stored, other.clone()], &live_map, 1_700_000_090_000);
    assert_eq!(merged[0].status, CheckStatus::InProgress);
    assert_eq!(merged[0].elapsed_seconds, 90);
    assert_eq!(merged[1].id, other.id);
    assert_eq!(merged[1].status, CheckStatus::NotStarted);
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
use crate::state::test_helpers::live as fixtures;

/// Owner, assigned watcher and a house-watching property with one started check.
#[cfg(feature = "live-db-tests")]
async fn started_check(state: &AppState) -> (Actor, Actor, HomeCheckSession) {
    let owner = fixtures::user(state, Role::Owner).await;
    let watcher = fixtures::user(state, Role::HouseWatcher).await;
    let property = fixtures::property(state, owner, ServiceType::HouseWatching).await;
    property::assign_watcher(&state.pool, owner, property.id, Some(watcher.id))
        .await
        .expect("watcher should be assigned");

    let scheduled = schedule_check(state, owner, property.id, ScheduleRequest::default())
        .await
        .expect("check should be scheduled");
    assert_eq!(scheduled.watcher_id, Some(watcher.id));
    let started = start_check(state, watcher, scheduled.id).await.expect("check should start");
    (owner, watcher, started)
}

#[cfg(feature = "live-db-tests")]
async fn finish_required(state: &AppState, watcher: Actor, session: &HomeCheckSession) {
    let required: Vec<Uuid> = session
        .checklist
        .iter()
        .flat_map(|s| s.items.iter())
        .filter(|i| i.required)
        .map(|i| i.id)
        .collect();
    for item_id in required {
        update_item(state, watcher, session.id, item_id, ItemPatch { done: Some(true), ..ItemPatch::default() })
            .await
            .expect("item should update");
    }
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn home_check_lifecycle_round_trip() {
    let state = fixtures::integration_state().await;
    let (_, watcher, started) = started_check(&state).await;
    assert_eq!(started.status, CheckStatus::InProgress);
    let stale = started.clone();

    let early = submit_check(&state, watcher, started.id).await;
    assert!(matches!(early, Err(HomeCheckError::Check(CheckError::MissingRequired(_)))));

    finish_required(&state, watcher, &started).await;

    let completed = submit_check(&state, watcher, started.id).await.expect("check should submit");
    assert_eq!(completed.status, CheckStatus::Completed);
    assert!(completed.duration_seconds.is_some());
    assert!(state.checks.read().await.is_empty());

    // A late autosave of an older in-progress copy must not reopen the check.
    assert!(!upsert_check(&state.pool, &stale).await.expect("upsert should run"));
    let stored = load_check(&state.pool, started.id)
        .await
        .expect("load should succeed")
        .expect("check should exist");
    assert_eq!(stored.status, CheckStatus::Completed);
    assert_eq!(stored.completed_at, completed.completed_at);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn deleting_property_drops_live_checks() {
    let state = fixtures::integration_state().await;
    let (owner, watcher, started) = started_check(&state).await;
    let item_id = first_item(&started, false);
    assert!(state.checks.read().await.contains_key(&started.id));

    delete_property(&state, owner, started.property_id).await.expect("property should be deleted");

    assert!(!state.checks.read().await.contains_key(&started.id));
    let update = update_item(&state, watcher, started.id, item_id, ItemPatch { done: Some(true), ..ItemPatch::default() }).await;
    assert!(matches!(update, Err(HomeCheckError::NotFound(_))));
    assert!(matches!(get_check(&state, watcher, started.id).await, Err(HomeCheckError::NotFound(_))));
    assert!(load_check(&state.pool, started.id).await.expect("load should succeed").is_none());
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn autosave_drops_session_whose_property_is_gone() {
    let state = fixtures::integration_state().await;
    let (owner, _, started) = started_check(&state).await;

    // Delete underneath the live session, the way a second server would.
    property::delete_property(&state.pool, owner, started.property_id)
        .await
        .expect("property should be deleted");
    state.checks.write().await.get_mut(&started.id).expect("check should be live").dirty = true;

    assert_eq!(persistence::flush_dirty_checks(&state).await, 0);
    assert!(state.checks.read().await.is_empty());
    assert_eq!(persistence::flush_dirty_checks(&state).await, 0);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn submit_over_completed_row_is_rejected_and_evicts() {
    let state = fixtures::integration_state().await;
    let (_, watcher, started) = started_check(&state).await;
    finish_required(&state, watcher, &started).await;
    let stale = live(&state, started.id).await.session;

    submit_check(&state, watcher, started.id).await.expect("check should submit");
    test_helpers::seed_live_check(&state, stale, true).await;

    let again = submit_check(&state, watcher, started.id).await;
    assert!(matches!(
        again,
        Err(HomeCheckError::Check(CheckError::InvalidTransition { from: CheckStatus::Completed, .. }))
    ));
    assert!(state.checks.read().await.is_empty());
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn hydrate_racing_submit_never_revives_completed_check() {
    let state = fixtures::integration_state().await;
    let (_, watcher, started) = started_check(&state).await;
    finish_required(&state, watcher, &started).await;
    assert!(save_live(&state, started.id).await.expect("save should succeed"));

    // Simulate a restart: the row is in progress and nothing is live.
    state.checks.write().await.clear();
    let notes = DetailsPatch { general_notes: Some("gate latched".into()), ..DetailsPatch::default() };
    let (submitted, _) = tokio::join!(
        submit_check(&state, watcher, started.id),
        update_details(&state, watcher, started.id, notes),
    );
    submitted.expect("check should submit");

    let stored = load_check(&state.pool, started.id).await.expect("load should succeed").expect("row exists");
    assert_eq!(stored.status, CheckStatus::Completed);
    assert!(!state.checks.read().await.contains_key(&started.id));
}
