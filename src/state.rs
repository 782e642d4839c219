//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the parsed config, the checklist template and
//! a map of live home-check sessions. A session becomes live when it is
//! started (or first touched after a restart) and stays in memory until it
//! is submitted; the autosave task flushes dirty sessions in the background.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::services::checklist::{ChecklistTemplate, HomeCheckSession};
use crate::services::weather::WeatherLookup;

// =============================================================================
// LIVE CHECK
// =============================================================================

/// An in-progress home check held in memory between autosaves.
#[derive(Debug, Clone)]
pub struct LiveCheck {
    pub session: HomeCheckSession,
    /// Set on every mutation, cleared once a write of the same version lands.
    pub dirty: bool,
}

impl LiveCheck {
    #[must_use]
    pub fn clean(session: HomeCheckSession) -> Self {
        Self { session, dirty: false }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub checks: Arc<RwLock<HashMap<Uuid, LiveCheck>>>,
    pub template: Arc<ChecklistTemplate>,
    /// Optional weather client. `None` if lookups are disabled.
    pub weather: Option<Arc<dyn WeatherLookup>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        template: ChecklistTemplate,
        weather: Option<Arc<dyn WeatherLookup>>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            checks: Arc::new(RwLock::new(HashMap::new())),
            template: Arc::new(template),
            weather,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_check_clean_is_not_dirty() {
        let live = LiveCheck::clean(test_helpers::dummy_session(None));
        assert!(!live.dirty);
    }

    #[tokio::test]
    async fn seed_live_check_inserts_session() {
        let state = test_helpers::test_app_state();
        let session = test_helpers::dummy_started_session(None);
        let id = test_helpers::seed_live_check(&state, session, true).await;

        let checks = state.checks.read().await;
        let live = checks.get(&id).expect("seeded check should exist");
        assert!(live.dirty);
        assert_eq!(live.session.id, id);
    }

    #[tokio::test]
    async fn new_state_has_no_live_checks() {
        let state = test_helpers::test_app_state();
        assert!(state.checks.read().await.is_empty());
        assert!(state.weather.is_none());
    }
}
