//! Tests for configuration validation

use std::time::Duration;

use hearthkit::config::{
    BackoffConfig, ExecutorConfig, LivenessConfig, ThrottleConfig, ToolkitConfig,
    DEFAULT_SHUTDOWN_GRACE_MS,
};

#[test]
fn test_executor_config_validation() {
    let valid = ExecutorConfig::new("plug-poller");
    assert!(valid.validate().is_ok());
    assert_eq!(valid.shutdown_grace(), Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS));
}

#[test]
fn test_executor_config_blank_name() {
    let invalid = ExecutorConfig::new("   ");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_executor_config_zero_grace() {
    let invalid = ExecutorConfig::new("poller").with_shutdown_grace(Duration::ZERO);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_backoff_config_default_is_valid() {
    assert!(BackoffConfig::default().validate().is_ok());
}

#[test]
fn test_backoff_config_invalid_multiplier() {
    let invalid = BackoffConfig {
        multiplier: 1.0,
        ..BackoffConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_backoff_config_invalid_randomization() {
    let invalid = BackoffConfig {
        randomization_factor: 1.0,
        ..BackoffConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_backoff_config_max_below_initial() {
    let invalid = BackoffConfig {
        initial_interval_ms: 1_000,
        max_interval_ms: 500,
        ..BackoffConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_liveness_and_throttle_zero_rejected() {
    assert!(LivenessConfig { threshold_ms: 0 }.validate().is_err());
    assert!(ThrottleConfig { window_ms: 0 }.validate().is_err());
    assert_eq!(
        LivenessConfig { threshold_ms: 1_500 }.threshold(),
        Duration::from_millis(1_500)
    );
}

#[test]
fn test_toolkit_config_from_json() {
    let json = r#"
    {
        "executor": { "thread_name": "gateway" },
        "backoff": {
            "initial_interval_ms": 100,
            "multiplier": 2.0,
            "randomization_factor": 0.1,
            "max_interval_ms": 5000,
            "max_elapsed_time_ms": 60000
        },
        "liveness": { "threshold_ms": 300000 }
    }
    "#;

    let cfg = ToolkitConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.executor.thread_name, "gateway");
    assert_eq!(cfg.executor.shutdown_grace_ms, DEFAULT_SHUTDOWN_GRACE_MS);
    assert_eq!(cfg.backoff.unwrap().initial_interval_ms, 100);
    assert_eq!(cfg.liveness.unwrap().threshold_ms, 300_000);
    assert!(cfg.throttle.is_none());
}

#[test]
fn test_toolkit_config_invalid_section_named() {
    let json = r#"
    {
        "executor": { "thread_name": "gateway" },
        "throttle": { "window_ms": 0 }
    }
    "#;

    let err = ToolkitConfig::from_json_str(json).unwrap_err();
    assert!(err.starts_with("throttle invalid"), "{err}");
}

#[test]
fn test_toolkit_config_parse_error() {
    let err = ToolkitConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");
}
