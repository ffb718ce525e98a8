use std::time::Duration;

use tradeq::config::{Config, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_CONCURRENCY, DEFAULT_PROCESS_DELAY};
use tradeq::dispatch::FailurePolicy;

const VARS: [&str; 5] = [
    "TRADEQ_MAX_CONCURRENCY",
    "TRADEQ_LISTEN_ADDR",
    "TRADEQ_PROCESS_DELAY_MS",
    "TRADEQ_FAILURE_POLICY",
    "OTEL_ENDPOINT",
];

fn clear_env() {
    unsafe {
        for var in VARS {
            std::env::remove_var(var);
        }
    }
}

// Environment variables are process-wide, so every env-driven case lives in
// this one test to keep them from racing each other.
#[test]
fn config_from_env() {
    clear_env();
    let config = Config::from_env().unwrap();
    assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
    assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
    assert_eq!(config.process_delay, DEFAULT_PROCESS_DELAY);
    assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    assert!(config.otel_endpoint.is_none());
    assert!(!config.log_level.is_empty());

    unsafe {
        std::env::set_var("TRADEQ_MAX_CONCURRENCY", " 12 ");
        std::env::set_var("TRADEQ_LISTEN_ADDR", "127.0.0.1:9000");
        std::env::set_var("TRADEQ_PROCESS_DELAY_MS", "250");
        std::env::set_var("TRADEQ_FAILURE_POLICY", "isolate");
        std::env::set_var("OTEL_ENDPOINT", "http://localhost:4317");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.max_concurrency, 12);
    assert_eq!(config.listen_addr, "127.0.0.1:9000");
    assert_eq!(config.process_delay, Duration::from_millis(250));
    assert_eq!(config.failure_policy, FailurePolicy::Isolate);
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));

    unsafe { std::env::set_var("TRADEQ_MAX_CONCURRENCY", "0") };
    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("TRADEQ_MAX_CONCURRENCY"), "{err}");

    unsafe { std::env::set_var("TRADEQ_MAX_CONCURRENCY", "lots") };
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("TRADEQ_MAX_CONCURRENCY", "3");
        std::env::set_var("TRADEQ_FAILURE_POLICY", "retry-forever");
    }
    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("TRADEQ_FAILURE_POLICY"), "{err}");

    unsafe { std::env::set_var("TRADEQ_FAILURE_POLICY", "fail-fast") };
    unsafe { std::env::set_var("TRADEQ_PROCESS_DELAY_MS", "-5") };
    assert!(Config::from_env().is_err());

    clear_env();
}

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.max_concurrency > 0);
    assert_eq!(config.log_level, "info");
}
