//! Config Validation Tests
//!
//! Typo detection on unknown keys and range checks on thresholds, exercised
//! independently from the rest of the supervisor.

use relay_sentinel::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use relay_sentinel::config::{ConfigError, SentinelConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_threshold_warns_with_suggestion() {
    let toml_str = r#"
[thresholds]
critcal_timeout_mins = 45
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("critcal_timeout_mins"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("thresholds.critical_timeout_mins")
    );
}

#[test]
fn typo_in_device_section_warns() {
    let toml_str = r#"
[device]
vendr = "Xiaomi"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("device.vendor"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[device]
vendor = "samsung"

[thresholds]
dead_on_start_mins = 15
degraded_timeout_mins = 30
critical_timeout_mins = 60
alert_cooldown_secs = 300

[connection]
client_id = "relay-01"
reconnect_ladder_secs = [2, 5, 15, 30, 60]
topics = ["relay/notifications", "relay/acks"]

[worker]
heartbeat_interval_secs = 60
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn unrelated_key_gets_no_suggestion() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("completely_unrelated_setting", &known), None);
}

#[test]
fn unknown_keys_do_not_fail_loading() {
    let config = SentinelConfig::from_toml_str(
        r#"
[device]
vendor = "oppo"
colour = "blue"
"#,
    )
    .unwrap();
    assert_eq!(config.device.vendor, "oppo");
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn custom_thresholds_are_loaded() {
    let config = SentinelConfig::from_toml_str(
        r#"
[thresholds]
degraded_timeout_mins = 10
critical_timeout_mins = 20
"#,
    )
    .unwrap();
    assert_eq!(config.thresholds.degraded_timeout_mins, 10);
    assert_eq!(config.thresholds.critical_timeout_mins, 20);
    assert_eq!(config.thresholds.dead_on_start_mins, 15);
}

#[test]
fn all_range_errors_are_collected() {
    let err = SentinelConfig::from_toml_str(
        r#"
[thresholds]
dead_on_start_mins = 0
degraded_timeout_mins = 60
critical_timeout_mins = 30

[connection]
reconnect_ladder_secs = []
"#,
    )
    .unwrap_err();

    match err {
        ConfigError::Validation(errors) => {
            assert_eq!(errors.len(), 3, "unexpected errors: {errors:?}");
            assert!(errors.iter().any(|e| e.contains("dead_on_start_mins")));
            assert!(errors.iter().any(|e| e.contains("critical_timeout_mins")));
            assert!(errors.iter().any(|e| e.contains("reconnect_ladder_secs")));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn heartbeat_slower_than_degraded_timeout_is_rejected() {
    let err = SentinelConfig::from_toml_str(
        r#"
[worker]
heartbeat_interval_secs = 3600
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = SentinelConfig::from_toml_str("[thresholds\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
}

#[test]
fn load_from_file_reads_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sentinel.toml");
    std::fs::write(&path, "[device]\nvendor = \"Huawei\"\n").unwrap();

    let config = SentinelConfig::load_from_file(&path).unwrap();
    assert_eq!(config.device.vendor, "Huawei");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SentinelConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}
