use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of an export work item.
///
/// `Failed` items, and `InProgress` items whose lease has expired, can be
/// claimed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportBatchStatus {
    Created,
    InProgress,
    Published,
    Failed,
}

impl ExportBatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::InProgress => "IN_PROGRESS",
            Self::Published => "PUBLISHED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ExportBatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportBatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "PUBLISHED" => Ok(Self::Published),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("'{}' is not a valid export batch status", s)),
        }
    }
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ExportWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

/// One partitioned unit of export work: batch `batch_num` of `batch_size`
/// for a single region and window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBatch {
    pub batch_id: i32,
    pub region: String,
    pub window: ExportWindow,
    pub batch_num: i32,
    pub batch_size: i32,
    pub max_records: i32,
    pub status: ExportBatchStatus,
    pub filename: Option<String>,
}

impl ExportBatch {
    /// Offset of this batch's first record in the window's ordered record set.
    pub fn record_offset(&self) -> u64 {
        (self.batch_num.max(1) as u64 - 1) * self.max_records.max(0) as u64
    }

    /// Object name of the published artifact.
    pub fn object_name(&self) -> String {
        format!(
            "{}/{}-{}-{:05}.bin",
            self.region,
            self.window.start.timestamp(),
            self.window.end.timestamp(),
            self.batch_num
        )
    }
}
