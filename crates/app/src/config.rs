//! Application configuration loaded from environment variables.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use domain::WireFormat;

use crate::error::{AppError, Result};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Runtime configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `BOOTSTRAP_SERVERS`: broker address (default: `"memory://local"`)
/// - `TOPIC`: saga topic (default: `"payments"`)
/// - `PARTITIONS`: partitions per topic (default: `3`)
/// - `POLL_TIMEOUT_MS`: consumer poll timeout (default: `1000`)
/// - `RETRY_BACKOFF_MS`: pause before a failed record is redelivered (default: `1000`)
/// - `MAX_POLL_RECORDS`: records per partition per poll (default: `500`)
/// - `WIRE_FORMAT`: `json` or `colon` (default: `json`)
/// - `PAYMENT_COUNT`: distinct payments the demo requests (default: `1`)
/// - `PAYMENT_REPEAT`: requests sent per payment key (default: `2`)
/// - `PAYMENT_INTERVAL_MS`: pause between requests (default: `1000`)
/// - `PAYMENT_AMOUNT`: amount of each payment (default: `100`)
/// - `METRICS_ADDR`: Prometheus listener address (default: unset, no listener)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bootstrap_servers: String,
    pub topic: String,
    pub partitions: u32,
    pub poll_timeout: Duration,
    pub retry_backoff: Duration,
    pub max_poll_records: usize,
    pub wire_format: WireFormat,
    pub payment_count: usize,
    pub payment_repeat: usize,
    pub payment_interval: Duration,
    pub payment_amount: i64,
    pub metrics_addr: Option<SocketAddr>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap_servers: "memory://local".to_string(),
            topic: saga::DEFAULT_TOPIC.to_string(),
            partitions: event_log::memory::DEFAULT_PARTITIONS,
            poll_timeout: Duration::from_millis(1000),
            retry_backoff: Duration::from_millis(1000),
            max_poll_records: event_log::memory::DEFAULT_MAX_POLL_RECORDS,
            wire_format: WireFormat::Json,
            payment_count: 1,
            payment_repeat: 2,
            payment_interval: Duration::from_millis(1000),
            payment_amount: 100,
            metrics_addr: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for unset ones.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration from `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let millis = |var: &'static str, default: Duration| -> Result<Duration> {
            Ok(Duration::from_millis(parse(
                &lookup,
                var,
                default.as_millis() as u64,
            )?))
        };

        let config = Self {
            bootstrap_servers: lookup("BOOTSTRAP_SERVERS").unwrap_or(defaults.bootstrap_servers),
            topic: lookup("TOPIC").unwrap_or(defaults.topic),
            partitions: parse(&lookup, "PARTITIONS", defaults.partitions)?,
            poll_timeout: millis("POLL_TIMEOUT_MS", defaults.poll_timeout)?,
            retry_backoff: millis("RETRY_BACKOFF_MS", defaults.retry_backoff)?,
            max_poll_records: parse(&lookup, "MAX_POLL_RECORDS", defaults.max_poll_records)?,
            wire_format: parse(&lookup, "WIRE_FORMAT", defaults.wire_format)?,
            payment_count: parse(&lookup, "PAYMENT_COUNT", defaults.payment_count)?,
            payment_repeat: parse(&lookup, "PAYMENT_REPEAT", defaults.payment_repeat)?,
            payment_interval: millis("PAYMENT_INTERVAL_MS", defaults.payment_interval)?,
            payment_amount: parse(&lookup, "PAYMENT_AMOUNT", defaults.payment_amount)?,
            metrics_addr: lookup("METRICS_ADDR")
                .map(|value| parse_value("METRICS_ADDR", value))
                .transpose()?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(&lookup, "LOG_FORMAT", defaults.log_format)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.partitions == 0 {
            return Err(invalid("PARTITIONS", "0", "must be at least 1"));
        }
        if self.max_poll_records == 0 {
            return Err(invalid("MAX_POLL_RECORDS", "0", "must be at least 1"));
        }
        if event_log::log::validate_topic(&self.topic).is_err() {
            return Err(invalid("TOPIC", &self.topic, "not a valid topic name"));
        }
        Ok(())
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        Some(value) => parse_value(var, value),
        None => Ok(default),
    }
}

fn parse_value<T>(var: &'static str, value: String) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(var, &value, e))
}

fn invalid(var: &'static str, value: &str, reason: impl Display) -> AppError {
    AppError::Config {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
