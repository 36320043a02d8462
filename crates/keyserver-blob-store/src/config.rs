use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobStoreBackend {
    LocalFs,
    InMemory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BlobStoreConfig {
    pub backend: BlobStoreBackend,
    /// Buckets are directories under this path for the `local_fs` backend.
    pub root_dir: PathBuf,
}
