use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{RepositoryError, Result};

pub(crate) fn to_unix(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp()
}

pub(crate) fn from_unix(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| RepositoryError::InvalidData(format!("timestamp {} out of range", seconds)))
}

pub(crate) fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn encode_regions(regions: &[String]) -> Result<String> {
    serde_json::to_string(regions)
        .map_err(|e| RepositoryError::InvalidData(format!("encoding regions: {}", e)))
}

pub(crate) fn decode_regions(value: &str) -> Result<Vec<String>> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(value)
        .map_err(|e| RepositoryError::InvalidData(format!("decoding regions {:?}: {}", value, e)))
}
