//! Weather lookup for home-check starts.
//!
//! Thin HTTP wrapper around the Open-Meteo current-conditions endpoint.
//! Parsing and code mapping are pure functions for testability. Lookups are
//! best-effort: callers log failures and carry on without weather text.

use std::time::Duration;

use serde::Deserialize;

use crate::config::WeatherConfig;

const CONNECT_TIMEOUT_SECS: u64 = 3;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("weather request failed: {0}")]
    Request(String),
    #[error("weather response error: status {status}")]
    Response { status: u16, body: String },
    #[error("weather response parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub description: String,
    pub temperature_c: f64,
}

impl WeatherReport {
    /// Text stored on the home check, e.g. `Partly cloudy, 21.5°C`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{}, {:.1}°C", self.description, self.temperature_c)
    }
}

/// Current-conditions lookup. Implemented by the HTTP client and by test mocks.
#[async_trait::async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<WeatherReport, WeatherError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct OpenMeteoClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    /// # Errors
    ///
    /// Returns `HttpClientBuild` if the reqwest client cannot be constructed.
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| WeatherError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_owned() })
    }
}

#[async_trait::async_trait]
impl WeatherLookup for OpenMeteoClient {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<WeatherReport, WeatherError> {
        let url = format!("{}/forecast", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", "temperature_2m,weather_code".to_owned()),
            ])
            .send()
            .await
            .map_err(|e| WeatherError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| WeatherError::Request(e.to_string()))?;

        if status != 200 {
            return Err(WeatherError::Response { status, body: text });
        }

        parse_response(&text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct ApiResponse {
    current: ApiCurrent,
}

#[derive(Deserialize)]
struct ApiCurrent {
    temperature_2m: f64,
    weather_code: u16,
}

pub(crate) fn parse_response(text: &str) -> Result<WeatherReport, WeatherError> {
    let parsed: ApiResponse = serde_json::from_str(text).map_err(|e| WeatherError::Parse(e.to_string()))?;
    Ok(WeatherReport {
        description: describe_weather_code(parsed.current.weather_code).to_owned(),
        temperature_c: parsed.current.temperature_2m,
    })
}

/// Human-readable text for a WMO weather interpretation code.
#[must_use]
pub fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Light rain",
        63 => "Rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 => "Light snow",
        73 => "Snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown conditions",
    }
}

#[cfg(test)]
#[path = "weather_test.rs"]
mod tests;
