use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::{BlobStore, BlobStoreError, Result, validate_name};

/// Stores each bucket as a directory under `root`.
///
/// Promotion is a `rename`, which is atomic as long as both buckets live on
/// the same filesystem.
pub struct LocalFsBlobStore {
    root: PathBuf,
}

impl LocalFsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf> {
        validate_name(bucket)?;
        validate_name(name)?;
        Ok(self.root.join(bucket).join(name))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobStoreError::io(parent, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalFsBlobStore {
    async fn put(&self, bucket: &str, name: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, name)?;
        Self::ensure_parent(&path).await?;
        fs::write(&path, data)
            .await
            .map_err(|e| BlobStoreError::io(&path, e))?;

        tracing::debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, name)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobStoreError::NotFound {
                    bucket: bucket.to_string(),
                    name: name.to_string(),
                }
            } else {
                BlobStoreError::io(&path, e)
            }
        })
    }

    async fn exists(&self, bucket: &str, name: &str) -> Result<bool> {
        let path = self.object_path(bucket, name)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| BlobStoreError::io(&path, e))
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<()> {
        let path = self.object_path(bucket, name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobStoreError::io(&path, e)),
        }
    }

    async fn promote(&self, from_bucket: &str, to_bucket: &str, name: &str) -> Result<()> {
        let from = self.object_path(from_bucket, name)?;
        let to = self.object_path(to_bucket, name)?;
        Self::ensure_parent(&to).await?;

        fs::rename(&from, &to).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobStoreError::NotFound {
                    bucket: from_bucket.to_string(),
                    name: name.to_string(),
                }
            } else {
                BlobStoreError::io(&from, e)
            }
        })?;

        tracing::debug!(from = %from.display(), to = %to.display(), "Promoted object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());

        store.put("tmp", "US/a.bin", b"hello").await.unwrap();
        assert!(store.exists("tmp", "US/a.bin").await.unwrap());
        assert_eq!(store.get("tmp", "US/a.bin").await.unwrap(), b"hello");
        assert!(dir.path().join("tmp/US/a.bin").is_file());

        store.delete("tmp", "US/a.bin").await.unwrap();
        store.delete("tmp", "US/a.bin").await.unwrap();
        assert!(!store.exists("tmp", "US/a.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());

        assert!(matches!(
            store.get("exports", "missing.bin").await,
            Err(BlobStoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_promote_moves_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());

        store.put("exports", "US/a.bin", b"old").await.unwrap();
        store.put("tmp", "US/a.bin", b"new").await.unwrap();
        store.promote("tmp", "exports", "US/a.bin").await.unwrap();

        assert_eq!(store.get("exports", "US/a.bin").await.unwrap(), b"new");
        assert!(!store.exists("tmp", "US/a.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_promote_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());

        assert!(matches!(
            store.promote("tmp", "exports", "nope.bin").await,
            Err(BlobStoreError::NotFound { bucket, .. }) if bucket == "tmp"
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());

        assert!(matches!(
            store.put("tmp", "../outside.bin", b"x").await,
            Err(BlobStoreError::InvalidName(_))
        ));
    }
}
