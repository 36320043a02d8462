//! Tracing subscriber and Prometheus exporter setup.
//!
//! Both the server and `sync_federation_query` call [`initialize`]; whichever
//! runs first wins and later calls leave the installed subscriber alone.

mod config;

use std::net::SocketAddr;

pub(crate) use config::{LogFormat, LoggerConfig, TelemetryConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FALLBACK_FILTER: &str = "info";

pub(crate) fn initialize(logger_config: &LoggerConfig, telemetry_config: &TelemetryConfig) {
    let filter = env_filter(std::env::var("RUST_LOG").ok().as_deref(), &logger_config.level);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match logger_config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }

    if let Some(address) = telemetry_config.metrics_address {
        install_prometheus(address);
    }
}

/// `RUST_LOG` first, then the configured directives, then [`FALLBACK_FILTER`].
fn env_filter(rust_log: Option<&str>, configured: &str) -> EnvFilter {
    if let Some(filter) = rust_log.and_then(|value| EnvFilter::try_new(value).ok()) {
        return filter;
    }
    EnvFilter::try_new(configured).unwrap_or_else(|error| {
        eprintln!(
            "invalid log filter {:?} ({}), using {:?}",
            configured, error, FALLBACK_FILTER
        );
        EnvFilter::new(FALLBACK_FILTER)
    })
}

fn install_prometheus(address: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(address).install() {
        Ok(()) => tracing::info!(address = %address, "Prometheus exporter listening"),
        Err(error) => tracing::warn!(
            address = %address,
            error = %error,
            "Prometheus exporter not installed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_takes_precedence() {
        let filter = env_filter(Some("keyserver=trace"), "warn");
        assert_eq!(filter.to_string(), "keyserver=trace");
    }

    #[test]
    fn test_configured_level_used_without_rust_log() {
        let filter = env_filter(None, "info,sqlx=warn");
        assert!(filter.to_string().contains("sqlx=warn"));
    }

    #[test]
    fn test_invalid_levels_fall_back() {
        let filter = env_filter(Some("keyserver=loud"), "sqlx=quiet");
        assert_eq!(filter.to_string(), FALLBACK_FILTER);
    }
}
