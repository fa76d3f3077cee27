//! Tracing subscriber and Prometheus exporter setup.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};
use crate::error::{AppError, Result};

/// Installs the global tracing subscriber.
///
/// The filter comes from `config.log_level`, falling back to `info` if the
/// directive does not parse.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    installed.map_err(|e| AppError::Telemetry(e.to_string()))
}

/// Installs the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime. Without a recorder the
/// runtime's counters are no-ops.
pub fn init_metrics(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::Telemetry(e.to_string()))?;
    tracing::info!(%addr, "serving Prometheus metrics");
    Ok(())
}
