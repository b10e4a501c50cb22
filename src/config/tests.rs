//! Tests for config functionality.

use crate::config::{AccountConfig, Config, ResetBoundary};
use crate::error::TierwatchError;
use crate::task::Domain;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.pool.accounts.len(), 3);
    assert_eq!(config.pool.accounts[0].id, "A");
    assert_eq!(config.pool.accounts[0].daily_quota, 100);
    assert_eq!(config.pool.accounts[0].concurrency_limit, 15);
    assert_eq!(config.pool.reset_boundary, ResetBoundary::Utc);
    assert_eq!(config.dispatch.fault_injection_rate, 0.0);
    assert_eq!(config.watchdog.loop_threshold, 5);
    assert_eq!(config.watchdog.loop_window_ms, 180_000);
    assert_eq!(config.watchdog.similarity_threshold, 0.6);
    assert_eq!(config.watchdog.stall_timeout_ms, 120_000);
    assert_eq!(config.watchdog.kill_timeout_ms, 300_000);
    assert_eq!(config.watchdog.max_auto_retries, 3);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_empty_yaml() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config.pool.accounts.len(), 3);
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
state_dir: /var/lib/tierwatch
pool:
  reset_boundary: fixed_offset
  reset_offset_minutes: 60
  accounts:
    - id: east
      domains: [backend, quality]
      priority: 1
      daily_quota: 10
      concurrency_limit: 2
    - id: west
watchdog:
  loop_threshold: 3
  relaunch_commands:
    - agent --resume
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.state_dir.to_str(), Some("/var/lib/tierwatch"));
    assert_eq!(config.pool.reset_boundary, ResetBoundary::FixedOffset);
    assert_eq!(config.pool.reset_offset_minutes, 60);
    assert_eq!(
        config.pool.accounts[0],
        AccountConfig::new("east", vec![Domain::Backend, Domain::Quality], 1).with_limits(10, 2)
    );
    // Unspecified account fields fall back to defaults.
    assert_eq!(config.pool.accounts[1].daily_quota, 100);
    assert!(config.pool.accounts[1].domains.is_empty());

    assert_eq!(config.watchdog.loop_threshold, 3);
    assert_eq!(config.watchdog.relaunch_commands, vec!["agent --resume"]);
    assert_eq!(config.watchdog.buffer_size, 50);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
future_feature: true
dispatch:
  fast_timeout_ms: 5000
  shiny_new_knob: 3
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.dispatch.fast_timeout_ms, 5000);
}

#[test]
fn test_duplicate_account_ids_rejected() {
    let yaml = r#"
pool:
  accounts:
    - id: A
    - id: A
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, TierwatchError::Config(ref m) if m.contains("duplicate")));
}

#[test]
fn test_zero_quota_rejected() {
    let mut config = Config::default();
    config.pool.accounts[1].daily_quota = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_fault_rate_bounds() {
    let mut config = Config::default();
    config.dispatch.fault_injection_rate = 1.5;
    assert!(config.validate().is_err());
    config.dispatch.fault_injection_rate = 0.01;
    assert!(config.validate().is_ok());
}

#[test]
fn test_similarity_threshold_bounds() {
    let mut config = Config::default();
    config.watchdog.similarity_threshold = 0.0;
    assert!(config.validate().is_err());
    config.watchdog.similarity_threshold = 1.0;
    assert!(config.validate().is_ok());
}

#[test]
fn test_history_keep_must_be_below_cap() {
    let mut config = Config::default();
    config.watchdog.history_keep = config.watchdog.history_cap;
    assert!(config.validate().is_err());
}

#[test]
fn test_yaml_round_trip_preserves_accounts() {
    let config = Config::default();
    let yaml = config.to_yaml().unwrap();
    let parsed = Config::from_yaml(&yaml).unwrap();
    assert_eq!(parsed.pool.accounts, config.pool.accounts);
}

#[test]
fn test_load_or_default_without_file() {
    let temp = TempDir::new().unwrap();
    let config = Config::load_or_default(temp.path().join("missing.yaml")).unwrap();
    assert_eq!(config.pool.accounts.len(), 3);
}

#[test]
fn test_load_reports_parse_errors() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tierwatch.yaml");
    std::fs::write(&path, "pool: [not, a, map]\n").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));
}
