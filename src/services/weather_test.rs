use super::*;

#[test]
fn parse_response_reads_current_block() {
    let body = r#"{
        "latitude": 26.14,
        "longitude": -81.79,
        "current_units": {"temperature_2m": "°C", "weather_code": "wmo code"},
        "current": {"time": "2024-03-01T14:00", "interval": 900, "temperature_2m": 21.5, "weather_code": 2}
    }"#;
    let report = parse_response(body).unwrap();
    assert_eq!(report.description, "Partly cloudy");
    assert!((report.temperature_c - 21.5).abs() < f64::EPSILON);
}

#[test]
fn parse_response_rejects_missing_current() {
    let err = parse_response(r#"{"latitude": 1.0}"#).unwrap_err();
    assert!(matches!(err, WeatherError::Parse(_)));
}

#[test]
fn parse_response_rejects_garbage() {
    assert!(matches!(parse_response("not json"), Err(WeatherError::Parse(_))));
}

#[test]
fn summary_formats_one_decimal() {
    let report = WeatherReport { description: "Overcast".into(), temperature_c: 18.0 };
    assert_eq!(report.summary(), "Overcast, 18.0°C");

    let report = WeatherReport { description: "Clear sky".into(), temperature_c: -3.24 };
    assert_eq!(report.summary(), "Clear sky, -3.2°C");
}

#[test]
fn weather_codes_map_to_text() {
    assert_eq!(describe_weather_code(0), "Clear sky");
    assert_eq!(describe_weather_code(48), "Fog");
    assert_eq!(describe_weather_code(81), "Rain showers");
    assert_eq!(describe_weather_code(99), "Thunderstorm with hail");
    assert_eq!(describe_weather_code(42), "Unknown conditions");
}

#[test]
fn client_trims_trailing_slash_from_base_url() {
    let config = WeatherConfig { base_url: "https://example.test/v1/".into(), timeout: Duration::from_secs(1) };
    let client = OpenMeteoClient::new(&config).unwrap();
    assert_eq!(client.base_url, "https://example.test/v1");
}
