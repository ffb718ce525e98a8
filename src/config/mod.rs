//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast on values that do not parse.
//! Every variable has a default, so an empty environment is valid.

use crate::dispatch::FailurePolicy;
use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_PROCESS_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct Config {
    pub max_concurrency: usize,
    pub listen_addr: String,
    pub process_delay: Duration,
    pub failure_policy: FailurePolicy,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            process_delay: DEFAULT_PROCESS_DELAY,
            failure_policy: FailurePolicy::default(),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let max_concurrency =
            parsed_var("TRADEQ_MAX_CONCURRENCY")?.unwrap_or(defaults.max_concurrency);
        if max_concurrency == 0 {
            return Err(Error::Config(
                "TRADEQ_MAX_CONCURRENCY must be a positive integer".to_string(),
            ));
        }

        let process_delay = parsed_var::<u64>("TRADEQ_PROCESS_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.process_delay);

        Ok(Self {
            max_concurrency,
            listen_addr: std::env::var("TRADEQ_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            process_delay,
            failure_policy: parsed_var("TRADEQ_FAILURE_POLICY")?
                .unwrap_or(defaults.failure_policy),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid value for {name} ({raw:?}): {e}"))),
        Err(_) => Ok(None),
    }
}
