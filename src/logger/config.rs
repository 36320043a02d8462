use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct LoggerConfig {
    /// `EnvFilter` directives, e.g. "info,keyserver=debug,sqlx=warn".
    /// `RUST_LOG` replaces this when set.
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct TelemetryConfig {
    /// Prometheus scrape endpoint. No exporter is installed when unset.
    #[serde(default)]
    pub metrics_address: Option<SocketAddr>,
}
