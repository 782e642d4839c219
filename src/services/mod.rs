//! Domain services used by HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on request translation and auth plumbing.

pub mod checklist;
pub mod dashboard;
pub mod email_auth;
pub mod home_check;
pub mod maintenance;
pub mod message;
pub mod payment;
pub mod persistence;
pub mod photo;
pub mod property;
pub mod session;
pub mod tenant;
pub mod user;
pub mod vendor;
pub mod weather;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer};

/// Milliseconds since the Unix epoch; every stored timestamp uses this unit.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

/// Deserialize a field where `null` means "clear" and absence means "keep".
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
