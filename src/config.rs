//! Runtime configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` (if present) and then builds one `AppConfig`, which is
//! shared read-only through `AppState`. Only `DATABASE_URL` is mandatory;
//! every other knob has a default and malformed values fall back to it.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 30;
const DEFAULT_AUTOSAVE_SECS: u64 = 30;
const DEFAULT_PHOTO_DIR: &str = "data/photos";
const DEFAULT_PHOTO_MAX_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_WEATHER_API_BASE_URL: &str = "https://api.open-meteo.com/v1";
const DEFAULT_WEATHER_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
}

/// Access-code mail delivery settings. Both values must be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub resend_api_key: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub cookie_secure: bool,
    pub session_ttl_hours: i64,
    /// Interval between background flushes of dirty home-check sessions.
    pub autosave_interval: Duration,
    pub photo_dir: PathBuf,
    pub photo_max_bytes: usize,
    pub checklist_template_path: Option<PathBuf>,
    /// `None` disables the best-effort weather lookup at check start.
    pub weather: Option<WeatherConfig>,
    pub mail: Option<MailConfig>,
    /// Log access codes at `info` instead of (or in addition to) mailing them.
    pub log_access_codes: bool,
}

impl AppConfig {
    /// Build the config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let weather = if env_bool("WEATHER_ENABLED").unwrap_or(true) {
            Some(WeatherConfig {
                base_url: std::env::var("WEATHER_API_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_WEATHER_API_BASE_URL.to_owned()),
                timeout: Duration::from_secs(env_parse("WEATHER_TIMEOUT_SECS", DEFAULT_WEATHER_TIMEOUT_SECS)),
            })
        } else {
            None
        };

        let mail = match (std::env::var("RESEND_API_KEY"), std::env::var("RESEND_FROM")) {
            (Ok(resend_api_key), Ok(from)) if !resend_api_key.trim().is_empty() => {
                Some(MailConfig { resend_api_key, from })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS).max(1),
            autosave_interval: Duration::from_secs(env_parse("HOME_CHECK_AUTOSAVE_SECS", DEFAULT_AUTOSAVE_SECS).max(1)),
            photo_dir: std::env::var("PHOTO_DIR").map_or_else(|_| PathBuf::from(DEFAULT_PHOTO_DIR), PathBuf::from),
            photo_max_bytes: env_parse("PHOTO_MAX_BYTES", DEFAULT_PHOTO_MAX_BYTES),
            checklist_template_path: std::env::var("CHECKLIST_TEMPLATE_PATH").ok().map(PathBuf::from),
            weather,
            mail,
            log_access_codes: env_bool("AUTH_LOG_CODES").unwrap_or(false),
        })
    }

    /// Config with defaults everywhere, pointing at `database_url`.
    #[must_use]
    pub fn with_database_url(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_owned(),
            port: DEFAULT_PORT,
            cookie_secure: false,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            autosave_interval: Duration::from_secs(DEFAULT_AUTOSAVE_SECS),
            photo_dir: PathBuf::from(DEFAULT_PHOTO_DIR),
            photo_max_bytes: DEFAULT_PHOTO_MAX_BYTES,
            checklist_template_path: None,
            weather: None,
            mail: None,
            log_access_codes: false,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
