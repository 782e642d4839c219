use super::*;
use crate::services::checklist::DetailsPatch;
use crate::state::test_helpers;

#[tokio::test]
async fn flush_with_nothing_dirty_is_noop() {
    let state = test_helpers::test_app_state();
    let session = test_helpers::dummy_started_session(None);
    test_helpers::seed_live_check(&state, session, false).await;

    // No write is attempted, so the lazy pool is never touched.
    assert_eq!(flush_dirty_checks(&state).await, 0);
}

#[tokio::test]
async fn flush_failure_preserves_dirty_flag() {
    let state = test_helpers::test_app_state();
    let session = test_helpers::dummy_started_session(None);
    let id = test_helpers::seed_live_check(&state, session, true).await;

    // Test state uses connect_lazy; the write fails and must not clear dirty.
    assert_eq!(flush_dirty_checks(&state).await, 0);

    let checks = state.checks.read().await;
    assert!(checks.get(&id).expect("check should stay live").dirty);
}

#[tokio::test]
async fn clear_flushed_clears_matching_version() {
    let state = test_helpers::test_app_state();
    let session = test_helpers::dummy_started_session(None);
    let version = session.version;
    let id = test_helpers::seed_live_check(&state, session, true).await;

    clear_flushed(&state, &[(id, version)]).await;

    assert!(!state.checks.read().await.get(&id).unwrap().dirty);
}

#[tokio::test]
async fn clear_flushed_keeps_dirty_when_session_moved_on() {
    let state = test_helpers::test_app_state();
    let session = test_helpers::dummy_started_session(None);
    let flushed_version = session.version;
    let id = test_helpers::seed_live_check(&state, session, true).await;

    {
        let mut checks = state.checks.write().await;
        let live = checks.get_mut(&id).unwrap();
        live.session
            .update_details(DetailsPatch { general_notes: Some("late edit".into()), ..DetailsPatch::default() }, 1_700_000_005_000)
            .unwrap();
    }

    clear_flushed(&state, &[(id, flushed_version)]).await;

    assert!(state.checks.read().await.get(&id).unwrap().dirty);
}

#[tokio::test]
async fn clear_flushed_ignores_evicted_checks() {
    let state = test_helpers::test_app_state();
    clear_flushed(&state, &[(Uuid::new_v4(), 1)]).await;
    assert!(state.checks.read().await.is_empty());
}
