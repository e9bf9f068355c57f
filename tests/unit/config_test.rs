//! Tests for configuration validation

use grid_scheduler::config::{
    HistoryConfig, JournalBackendConfig, PricingConfig, SchedulerConfig,
};
use grid_scheduler::core::PolicyKind;

#[test]
fn test_scheduler_config_validation() {
    let valid = SchedulerConfig {
        policy: PolicyKind::Random,
        random_seed: Some(7),
        ..SchedulerConfig::default()
    };
    assert!(valid.validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_queue_depth() {
    let invalid = SchedulerConfig {
        max_queue_depth: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_staleness() {
    let invalid = SchedulerConfig {
        staleness_threshold_secs: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_alpha() {
    let invalid = SchedulerConfig {
        history: HistoryConfig {
            smoothing_alpha: 1.5,
            ..HistoryConfig::default()
        },
        ..SchedulerConfig::default()
    };
    let err = invalid.validate().unwrap_err();
    assert!(err.contains("smoothing_alpha"));
}

#[test]
fn test_scheduler_config_invalid_pricing() {
    let invalid = SchedulerConfig {
        pricing: PricingConfig {
            backlog: 3,
            ..PricingConfig::default()
        },
        ..SchedulerConfig::default()
    };
    let err = invalid.validate().unwrap_err();
    assert!(err.starts_with("pricing invalid"));
}

#[test]
fn test_scheduler_config_invalid_journal() {
    let invalid = SchedulerConfig {
        journal: JournalBackendConfig::InMemory { capacity: 0 },
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "policy": "random",
        "staleness_threshold_secs": 120,
        "expire_after_secs": 3600,
        "max_queue_depth": 50,
        "random_seed": 42,
        "history": { "smoothing_alpha": 0.5, "ttl_secs": 86400 },
        "journal": "disabled"
    }"#;

    let cfg = SchedulerConfig::from_json_str(json).expect("parse config");
    assert_eq!(cfg.policy, PolicyKind::Random);
    assert_eq!(cfg.random_seed, Some(42));
    assert_eq!(cfg.expire_after_ms(), Some(3_600_000));
    assert_eq!(cfg.history.smoothing_alpha, 0.5);
    assert_eq!(cfg.journal, JournalBackendConfig::Disabled);
    assert_eq!(cfg.history.lost_after_secs, HistoryConfig::default().lost_after_secs);
    assert_eq!(cfg.pricing, PricingConfig::default());
}

#[test]
fn test_scheduler_config_pricing_from_json() {
    let json = r#"{
        "history": { "lost_after_secs": 0 },
        "pricing": { "load_adaptive": true, "multiply_delta": 0.05 }
    }"#;
    let cfg = SchedulerConfig::from_json_str(json).expect("parse config");
    assert_eq!(cfg.history.lost_after_ms(), 0);
    assert!(cfg.pricing.load_adaptive);
    assert_eq!(cfg.pricing.multiply_delta, 0.05);
    assert_eq!(cfg.pricing.backlog, 100);

    let err = SchedulerConfig::from_json_str(r#"{"pricing":{"multiply_delta":1.0}}"#).unwrap_err();
    assert!(err.contains("multiply_delta"));
}

#[test]
fn test_scheduler_config_rejects_unknown_policy() {
    let err = SchedulerConfig::from_json_str(r#"{"policy":"round_robin"}"#).unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_scheduler_config_from_env() {
    // only this test touches GRID_SCHED_* variables
    std::env::set_var("GRID_SCHED_POLICY", "best_price");
    std::env::set_var("GRID_SCHED_MAX_QUEUE_DEPTH", "25");
    std::env::set_var("GRID_SCHED_HISTORY_ALPHA", "0.5");
    std::env::set_var("GRID_SCHED_HISTORY_LOST_AFTER_SECS", "3600");
    std::env::set_var("GRID_SCHED_LOAD_PRICING", "true");
    std::env::set_var("GRID_SCHED_LOAD_MULTIPLY_DELTA", "0.02");
    let cfg = SchedulerConfig::from_env().expect("config from env");
    assert_eq!(cfg.policy, PolicyKind::BestPrice);
    assert_eq!(cfg.max_queue_depth, 25);
    assert_eq!(cfg.history.smoothing_alpha, 0.5);
    assert_eq!(cfg.history.lost_after_secs, 3600);
    assert!(cfg.pricing.load_adaptive);
    assert_eq!(cfg.pricing.multiply_delta, 0.02);

    std::env::set_var("GRID_SCHED_MAX_QUEUE_DEPTH", "many");
    let err = SchedulerConfig::from_env().unwrap_err();
    assert!(format!("{err:#}").contains("GRID_SCHED_MAX_QUEUE_DEPTH"));

    std::env::set_var("GRID_SCHED_MAX_QUEUE_DEPTH", "0");
    assert!(SchedulerConfig::from_env().is_err());

    std::env::remove_var("GRID_SCHED_POLICY");
    std::env::remove_var("GRID_SCHED_MAX_QUEUE_DEPTH");
    std::env::remove_var("GRID_SCHED_HISTORY_ALPHA");
    std::env::remove_var("GRID_SCHED_HISTORY_LOST_AFTER_SECS");
    std::env::remove_var("GRID_SCHED_LOAD_PRICING");
    std::env::remove_var("GRID_SCHED_LOAD_MULTIPLY_DELTA");
}
