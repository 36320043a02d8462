//! Bucketed object storage for export artifacts.
//!
//! Files are staged in one bucket and promoted into another once they are
//! completely written, so readers of the destination bucket never observe a
//! partial object.

mod config;
mod error;
mod in_memory;
mod local_fs;

use std::sync::Arc;

use async_trait::async_trait;

pub use config::{BlobStoreBackend, BlobStoreConfig};
pub use error::BlobStoreError;
pub use in_memory::InMemoryBlobStore;
pub use local_fs::LocalFsBlobStore;

pub type Result<T> = std::result::Result<T, BlobStoreError>;

// Used behind Arc<dyn BlobStore>, so async-trait rather than native async fns.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Creates or overwrites `name` in `bucket`.
    async fn put(&self, bucket: &str, name: &str, data: &[u8]) -> Result<()>;

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>>;

    async fn exists(&self, bucket: &str, name: &str) -> Result<bool>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, bucket: &str, name: &str) -> Result<()>;

    /// Moves `name` from `from_bucket` to `to_bucket`, replacing any object
    /// already there. The destination either has the old object or the
    /// complete new one.
    async fn promote(&self, from_bucket: &str, to_bucket: &str, name: &str) -> Result<()>;
}

pub fn build_blob_store(config: &BlobStoreConfig) -> Arc<dyn BlobStore> {
    match config.backend {
        BlobStoreBackend::LocalFs => Arc::new(LocalFsBlobStore::new(config.root_dir.clone())),
        BlobStoreBackend::InMemory => Arc::new(InMemoryBlobStore::new()),
    }
}

/// Rejects names that could escape the bucket once joined to a path.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let escapes = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if escapes {
        return Err(BlobStoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
