//! Typed default configuration.
//!
//! Every field has a default here so a deployment only needs to provide the
//! database password. `config.toml`, a `-c` file and environment variables
//! override these values in that order.

use std::{net::Ipv4Addr, path::PathBuf};

use keyserver_blob_store::{BlobStoreBackend, BlobStoreConfig};
use keyserver_repository::RepositoryManagerConfigRaw;

use super::{
    ConfigRaw, ExportConfigRaw,
    env::DEFAULT_MAX_RECORDS,
    raw::FederationConfigRaw,
};
use crate::{
    controllers::http_api_controller::router::HttpApiConfig,
    logger::{LogFormat, LoggerConfig, TelemetryConfig},
};

pub(crate) fn config() -> ConfigRaw {
    ConfigRaw {
        database: RepositoryManagerConfigRaw {
            user: "keyserver".to_string(),
            password: None,
            database: "keyserver".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            max_connections: 10,
            min_connections: 1,
        },
        http_api: HttpApiConfig {
            host: Ipv4Addr::UNSPECIFIED.into(),
            port: 8080,
        },
        export: ExportConfigRaw {
            period: "1h".to_string(),
            create_batches_timeout: "5m".to_string(),
            export_bucket: "exposure-exports".to_string(),
            tmp_export_bucket: "exposure-exports-tmp".to_string(),
            max_records: DEFAULT_MAX_RECORDS,
            worker_concurrency: 4,
            lease: "10m".to_string(),
            max_ingest_delay: "1m".to_string(),
        },
        federation: FederationConfigRaw {
            lock_ttl: "15m".to_string(),
        },
        blob_store: BlobStoreConfig {
            backend: BlobStoreBackend::LocalFs,
            root_dir: PathBuf::from("data/blobs"),
        },
        logger: LoggerConfig {
            level: "info,sqlx=warn".to_string(),
            format: LogFormat::Pretty,
        },
        telemetry: TelemetryConfig {
            metrics_address: None,
        },
    }
}
