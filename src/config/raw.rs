use std::time::Duration;

use keyserver_blob_store::BlobStoreConfig;
use keyserver_repository::{RepositoryManagerConfig, RepositoryManagerConfigRaw};
use serde::{Deserialize, Serialize};

use super::{
    ConfigError,
    env::{DEFAULT_CREATE_BATCHES_TIMEOUT, lenient_duration},
};
use crate::{
    controllers::http_api_controller::router::HttpApiConfig,
    logger::{LoggerConfig, TelemetryConfig},
};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigRaw {
    pub database: RepositoryManagerConfigRaw,
    pub http_api: HttpApiConfig,
    pub export: ExportConfigRaw,
    pub federation: FederationConfigRaw,
    pub blob_store: BlobStoreConfig,
    pub logger: LoggerConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub database: RepositoryManagerConfig,
    pub http_api: HttpApiConfig,
    pub export: ExportConfig,
    pub federation: FederationConfig,
    pub blob_store: BlobStoreConfig,
    pub logger: LoggerConfig,
    pub telemetry: TelemetryConfig,
}

impl ConfigRaw {
    pub(crate) fn resolve(self) -> Result<Config, ConfigError> {
        Ok(Config {
            database: self.database.resolve()?,
            http_api: self.http_api,
            export: self.export.resolve()?,
            federation: self.federation.resolve()?,
            blob_store: self.blob_store,
            logger: self.logger,
            telemetry: self.telemetry,
        })
    }
}

/// Export pipeline settings. Durations are humantime strings ("1h", "5m").
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExportConfigRaw {
    /// Length of one export window.
    pub period: String,
    /// Upper bound for one controller or worker invocation; also the TTL of
    /// the controller lock.
    pub create_batches_timeout: String,
    pub export_bucket: String,
    pub tmp_export_bucket: String,
    /// Maximum number of keys in one export file.
    pub max_records: u32,
    /// Work items a worker processes at the same time.
    pub worker_concurrency: usize,
    /// How long a claimed work item stays reserved for its worker.
    pub lease: String,
    /// Upper bound between stamping an exposure's `created_at` and its
    /// insert committing. A window is batched only once it ended at least
    /// this long ago.
    pub max_ingest_delay: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ExportConfig {
    pub period: Duration,
    pub create_batches_timeout: Duration,
    pub export_bucket: String,
    pub tmp_export_bucket: String,
    pub max_records: u32,
    pub worker_concurrency: usize,
    pub lease: Duration,
    pub max_ingest_delay: Duration,
}

impl ExportConfigRaw {
    pub(crate) fn resolve(self) -> Result<ExportConfig, ConfigError> {
        let period = strict_duration("export.period", &self.period)?;
        if period.as_secs() == 0 || period.subsec_nanos() != 0 {
            return Err(ConfigError::InvalidConfig(format!(
                "export.period must be a whole number of seconds, got {:?}",
                self.period
            )));
        }
        if self.max_records == 0 || self.max_records > i32::MAX as u32 {
            return Err(ConfigError::InvalidConfig(format!(
                "export.max_records must be between 1 and {}",
                i32::MAX
            )));
        }
        if self.worker_concurrency == 0 {
            return Err(ConfigError::InvalidConfig(
                "export.worker_concurrency must be at least 1".to_string(),
            ));
        }
        if self.export_bucket == self.tmp_export_bucket {
            return Err(ConfigError::InvalidConfig(
                "export.export_bucket and export.tmp_export_bucket must differ".to_string(),
            ));
        }

        Ok(ExportConfig {
            period,
            create_batches_timeout: lenient_duration(
                "CREATE_BATCHES_TIMEOUT",
                &self.create_batches_timeout,
                DEFAULT_CREATE_BATCHES_TIMEOUT,
            ),
            export_bucket: self.export_bucket,
            tmp_export_bucket: self.tmp_export_bucket,
            max_records: self.max_records,
            worker_concurrency: self.worker_concurrency,
            lease: strict_duration("export.lease", &self.lease)?,
            max_ingest_delay: strict_duration(
                "export.max_ingest_delay",
                &self.max_ingest_delay,
            )?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct FederationConfigRaw {
    /// TTL of the per-query sync lock.
    pub lock_ttl: String,
}

#[derive(Debug, Clone)]
pub(crate) struct FederationConfig {
    pub lock_ttl: Duration,
}

impl FederationConfigRaw {
    pub(crate) fn resolve(self) -> Result<FederationConfig, ConfigError> {
        Ok(FederationConfig {
            lock_ttl: strict_duration("federation.lock_ttl", &self.lock_ttl)?,
        })
    }
}

fn strict_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|error| {
        ConfigError::InvalidConfig(format!("{} {:?} is not a duration: {}", field, value, error))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults;

    #[test]
    fn test_defaults_need_only_a_password() {
        let mut raw = defaults::config();
        assert!(matches!(
            raw.clone().resolve(),
            Err(ConfigError::MissingSecret(_))
        ));

        raw.database.password = Some("secret".to_string());
        let config = raw.resolve().unwrap();
        assert_eq!(config.export.period, Duration::from_secs(3600));
        assert_eq!(config.export.create_batches_timeout, Duration::from_secs(300));
        assert_eq!(config.export.max_records, 30_000);
        assert_eq!(config.export.max_ingest_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_ingest_delay_is_an_error() {
        let mut raw = defaults::config().export;
        raw.max_ingest_delay = "a while".to_string();
        assert!(matches!(raw.resolve(), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_export_period_must_be_whole_seconds() {
        let mut raw = defaults::config().export;
        raw.period = "1500ms".to_string();
        assert!(matches!(raw.resolve(), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_export_rejects_zero_max_records() {
        let mut raw = defaults::config().export;
        raw.max_records = 0;
        assert!(matches!(raw.resolve(), Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_unparseable_timeout_falls_back_to_default() {
        let mut raw = defaults::config().export;
        raw.create_batches_timeout = "soon".to_string();
        assert_eq!(
            raw.resolve().unwrap().create_batches_timeout,
            DEFAULT_CREATE_BATCHES_TIMEOUT
        );
    }

    #[test]
    fn test_invalid_lock_ttl_is_an_error() {
        let raw = FederationConfigRaw {
            lock_ttl: "forever".to_string(),
        };
        assert!(matches!(raw.resolve(), Err(ConfigError::InvalidConfig(_))));
    }
}
