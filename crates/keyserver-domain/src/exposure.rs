use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored diagnosis key.
///
/// Every exposure belongs to exactly one region, which is what makes the
/// per-region export partitioning disjoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exposure {
    pub exposure_key: Vec<u8>,
    pub transmission_risk: i32,
    pub app_package_name: String,
    pub region: String,
    /// Start of validity, in 10 minute intervals since the epoch.
    pub interval_number: i32,
    /// Validity duration, in 10 minute intervals.
    pub interval_count: i32,
    pub created_at: DateTime<Utc>,
    pub local_provenance: bool,
    pub sync_id: Option<String>,
}
