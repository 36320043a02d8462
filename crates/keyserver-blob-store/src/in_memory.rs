use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{BlobStore, BlobStoreError, Result, validate_name};

type Key = (String, String);

/// Process-local store for tests. Clones share the same contents.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    objects: Arc<RwLock<HashMap<Key, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted object names currently stored in `bucket`.
    pub async fn list(&self, bucket: &str) -> Vec<String> {
        let objects = self.objects.read().await;
        let mut names: Vec<String> = objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    fn key(bucket: &str, name: &str) -> Result<Key> {
        validate_name(bucket)?;
        validate_name(name)?;
        Ok((bucket.to_string(), name.to_string()))
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bucket: &str, name: &str, data: &[u8]) -> Result<()> {
        let key = Self::key(bucket, name)?;
        self.objects.write().await.insert(key, data.to_vec());
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        let key = Self::key(bucket, name)?;
        self.objects
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            })
    }

    async fn exists(&self, bucket: &str, name: &str) -> Result<bool> {
        let key = Self::key(bucket, name)?;
        Ok(self.objects.read().await.contains_key(&key))
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<()> {
        let key = Self::key(bucket, name)?;
        self.objects.write().await.remove(&key);
        Ok(())
    }

    async fn promote(&self, from_bucket: &str, to_bucket: &str, name: &str) -> Result<()> {
        let from = Self::key(from_bucket, name)?;
        let to = Self::key(to_bucket, name)?;

        let mut objects = self.objects.write().await;
        let data = objects.remove(&from).ok_or_else(|| BlobStoreError::NotFound {
            bucket: from_bucket.to_string(),
            name: name.to_string(),
        })?;
        objects.insert(to, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_promote_and_list() {
        let store = InMemoryBlobStore::new();

        store.put("tmp", "US/b.bin", b"b").await.unwrap();
        store.put("tmp", "US/a.bin", b"a").await.unwrap();
        store.promote("tmp", "exports", "US/b.bin").await.unwrap();

        assert_eq!(store.list("tmp").await, vec!["US/a.bin".to_string()]);
        assert_eq!(store.list("exports").await, vec!["US/b.bin".to_string()]);
        assert_eq!(store.get("exports", "US/b.bin").await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_clones_share_contents() {
        let store = InMemoryBlobStore::new();
        let other = store.clone();

        store.put("exports", "x.bin", b"x").await.unwrap();
        assert!(other.exists("exports", "x.bin").await.unwrap());

        other.delete("exports", "x.bin").await.unwrap();
        assert!(matches!(
            store.get("exports", "x.bin").await,
            Err(BlobStoreError::NotFound { .. })
        ));
    }
}
