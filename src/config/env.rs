//! Environment variable overrides applied on top of the file configuration.
//!
//! | Variable | Overrides |
//! |---|---|
//! | `CREATE_BATCHES_TIMEOUT` | `export.create_batches_timeout` |
//! | `EXPORT_BUCKET` | `export.export_bucket` |
//! | `TMP_EXPORT_BUCKET` | `export.tmp_export_bucket` |
//! | `EXPORT_FILE_MAX_RECORDS` | `export.max_records` |
//! | `DB_PASSWORD` | `database.password` |
//! | `PORT` | `http_api.port` |

use std::time::Duration;

use super::{ConfigError, ConfigRaw};

pub(crate) const DEFAULT_CREATE_BATCHES_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub(crate) const DEFAULT_MAX_RECORDS: u32 = 30_000;

/// Applies every variable that `lookup` returns a value for.
pub(crate) fn apply_env_overrides(
    config: &mut ConfigRaw,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(timeout) = lookup("CREATE_BATCHES_TIMEOUT") {
        // Parsed leniently in `ExportConfigRaw::resolve`.
        config.export.create_batches_timeout = timeout;
    }
    if let Some(bucket) = lookup("EXPORT_BUCKET") {
        config.export.export_bucket = bucket;
    }
    if let Some(bucket) = lookup("TMP_EXPORT_BUCKET") {
        config.export.tmp_export_bucket = bucket;
    }
    if let Some(max_records) = lookup("EXPORT_FILE_MAX_RECORDS") {
        config.export.max_records = lenient_max_records(&max_records);
    }
    if let Some(password) = lookup("DB_PASSWORD") {
        config.database.password = Some(password);
    }
    if let Some(port) = lookup("PORT") {
        config.http_api.port = port.trim().parse().map_err(|_| {
            ConfigError::InvalidConfig(format!("PORT {:?} is not a valid port", port))
        })?;
    }
    Ok(())
}

/// Parses a duration, falling back to `default` with a warning.
pub(crate) fn lenient_duration(name: &str, value: &str, default: Duration) -> Duration {
    match humantime::parse_duration(value.trim()) {
        Ok(duration) => duration,
        Err(error) => {
            tracing::warn!(
                name,
                value,
                error = %error,
                default = %humantime::format_duration(default),
                "Failed to parse duration, using default"
            );
            default
        }
    }
}

fn lenient_max_records(value: &str) -> u32 {
    match value.trim().parse::<u32>() {
        Ok(max_records) if max_records > 0 => max_records,
        _ => {
            tracing::info!(
                value,
                default = DEFAULT_MAX_RECORDS,
                "Failed to parse EXPORT_FILE_MAX_RECORDS, using default"
            );
            DEFAULT_MAX_RECORDS
        }
    }
}
