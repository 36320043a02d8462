use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standing definition of what to pull from a federation peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationQuery {
    pub query_id: String,
    pub server_addr: String,
    pub include_regions: Vec<String>,
    pub exclude_regions: Vec<String>,
    /// Resumption cursor. Only moves forward once data has been observed.
    pub last_timestamp: DateTime<Utc>,
}

/// One historical attempt to execute a [`FederationQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationSync {
    pub sync_id: String,
    pub query_id: String,
    pub started: DateTime<Utc>,
    pub completed: Option<DateTime<Utc>>,
    pub insertions: Option<u32>,
    pub max_timestamp: Option<DateTime<Utc>>,
}

impl FederationSync {
    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }
}
