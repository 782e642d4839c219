use super::*;

// =============================================================================
// env_bool: uses unique env var names to avoid races with parallel tests.
// =============================================================================

#[test]
fn env_bool_true_variants() {
    for (i, val) in ["1", "true", "yes", "on"].iter().enumerate() {
        let key = format!("__TEST_HW_EB_TRUE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(true), "expected true for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_false_variants() {
    for (i, val) in ["0", "false", "no", "off"].iter().enumerate() {
        let key = format!("__TEST_HW_EB_FALSE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(false), "expected false for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_case_and_whitespace_insensitive() {
    let key = "__TEST_HW_EB_CI_551__";
    unsafe { std::env::set_var(key, "  On ") };
    assert_eq!(env_bool(key), Some(true));
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_bool_invalid_returns_none() {
    let key = "__TEST_HW_EB_INVALID_552__";
    unsafe { std::env::set_var(key, "maybe") };
    assert_eq!(env_bool(key), None);
    unsafe { std::env::remove_var(key) };
    assert_eq!(env_bool("__TEST_HW_EB_SURELY_UNSET__"), None);
}

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_reads_value() {
    let key = "__TEST_HW_EP_OK_553__";
    unsafe { std::env::set_var(key, " 45 ") };
    assert_eq!(env_parse::<u64>(key, 30), 45);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_falls_back_on_garbage() {
    let key = "__TEST_HW_EP_BAD_554__";
    unsafe { std::env::set_var(key, "thirty") };
    assert_eq!(env_parse::<u64>(key, 30), 30);
    unsafe { std::env::remove_var(key) };
    assert_eq!(env_parse::<u16>("__TEST_HW_EP_UNSET__", 3000), 3000);
}

// =============================================================================
// AppConfig
// =============================================================================

#[test]
fn with_database_url_uses_defaults() {
    let config = AppConfig::with_database_url("postgres://x");
    assert_eq!(config.database_url, "postgres://x");
    assert_eq!(config.port, 3000);
    assert_eq!(config.autosave_interval, Duration::from_secs(30));
    assert_eq!(config.photo_max_bytes, 10 * 1024 * 1024);
    assert!(config.weather.is_none());
    assert!(config.mail.is_none());
    assert!(!config.cookie_secure);
}
