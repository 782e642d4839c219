//! Persistence service: background autosave for live home checks.
//!
//! DESIGN
//! ======
//! A background task wakes on the autosave interval (30s by default) and
//! writes every dirty live session. Snapshots are cloned under the lock and
//! written lock-free, one check per write so a single bad record cannot hold
//! back the rest.
//!
//! ERROR HANDLING
//! ==============
//! Dirty flags are cleared only after a successful write of the same version.
//! Failures are logged and retried on the next tick: repeated upserts are
//! acceptable, silently losing a watcher's notes is not.
//!
//! Two failures are final and drop the session instead: the stored row is
//! already completed (the write is a no-op), or the property was deleted
//! underneath it (foreign-key violation).

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::checklist::HomeCheckSession;
use crate::services::{home_check, photo};
use crate::state::AppState;

/// Spawn the autosave task. Returns a handle for shutdown.
pub fn spawn_autosave_task(state: AppState) -> JoinHandle<()> {
    let interval = state.config.autosave_interval;
    info!(interval_secs = interval.as_secs(), "home check autosave configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; nothing is dirty yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            flush_dirty_checks(&state).await;
        }
    })
}

/// Write every dirty live session. Returns how many writes succeeded.
pub async fn flush_dirty_checks(state: &AppState) -> usize {
    // PHASE: SNAPSHOT DIRTY SESSIONS
    // WHY: clone under the lock, then do I/O lock-free.
    let snapshots: Vec<HomeCheckSession> = {
        let mut checks = state.checks.write().await;
        let now = crate::services::now_ms();
        checks
            .values_mut()
            .filter(|live| live.dirty)
            .map(|live| {
                live.session.refresh_elapsed(now);
                live.session.clone()
            })
            .collect()
    };
    if snapshots.is_empty() {
        return 0;
    }

    // PHASE: WRITE + ACK
    // WHY: a failed write keeps the dirty flag for the next tick.
    let mut flushed = Vec::with_capacity(snapshots.len());
    let mut dropped = Vec::new();
    for session in &snapshots {
        match home_check::upsert_check(&state.pool, session).await {
            Ok(true) => flushed.push((session.id, session.version)),
            Ok(false) => {
                warn!(check_id = %session.id, "stored home check is already completed; dropping live copy");
                dropped.push(session.id);
            }
            Err(e) if home_check::is_orphaned(&e) => {
                warn!(check_id = %session.id, property_id = %session.property_id, "property is gone; dropping live home check");
                dropped.push(session.id);
                if let Err(e) = photo::delete_check_photos(&state.config.photo_dir, session.id).await {
                    warn!(error = %e, check_id = %session.id, "failed to delete photos of orphaned check");
                }
            }
            Err(e) => {
                error!(error = %e, check_id = %session.id, version = session.version, "home check autosave failed");
            }
        }
    }
    clear_flushed(state, &flushed).await;
    home_check::evict(state, &dropped).await;
    info!(flushed = flushed.len(), dirty = snapshots.len(), "home check autosave");
    flushed.len()
}

/// Clear dirty flags for sessions whose written version is still current.
pub(crate) async fn clear_flushed(state: &AppState, flushed_versions: &[(Uuid, i32)]) {
    if flushed_versions.is_empty() {
        return;
    }
    let mut checks = state.checks.write().await;
    for (check_id, version) in flushed_versions {
        // EDGE: keep dirty if the session changed again after the snapshot.
        if let Some(live) = checks.get_mut(check_id) {
            if live.session.version == *version {
                live.dirty = false;
            }
        }
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
