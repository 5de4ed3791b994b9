//! Blob storage collaborator used for uploaded avatars.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;

/// Stored object together with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// MIME type given at upload.
    pub content_type: String,
    /// Raw object content.
    pub bytes: Vec<u8>,
}

/// Abstraction over a bucket/key blob store with public URLs.
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `bucket/key`, returning the object locator.
    fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'static, StorageResult<String>>;
    /// Public URL under which the object is served.
    fn public_url(&self, bucket: &str, key: &str) -> String;
    /// Object stored under `bucket/key`, if any.
    fn fetch(&self, bucket: &str, key: &str)
    -> BoxFuture<'static, StorageResult<Option<StoredObject>>>;
}

/// Object store keeping blobs in process memory, served by the HTTP layer.
#[derive(Clone)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<String, StoredObject>>,
    public_base: Arc<str>,
}

impl MemoryObjectStore {
    /// Create a store whose public URLs start with `public_base` (e.g. `http://localhost:8080`).
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            objects: Arc::new(DashMap::new()),
            public_base: Arc::from(public_base.into().trim_end_matches('/')),
        }
    }

    fn locator(bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }
}

impl ObjectStore for MemoryObjectStore {
    fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: String,
        bytes: Vec<u8>,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let locator = Self::locator(bucket, key);
        self.objects.insert(
            locator.clone(),
            StoredObject {
                content_type,
                bytes,
            },
        );
        Box::pin(async move { Ok(locator) })
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.public_base, bucket, key)
    }

    fn fetch(
        &self,
        bucket: &str,
        key: &str,
    ) -> BoxFuture<'static, StorageResult<Option<StoredObject>>> {
        let found = self
            .objects
            .get(&Self::locator(bucket, key))
            .map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uploaded_objects_are_fetchable_by_bucket_and_key() {
        let store = MemoryObjectStore::new("http://localhost:8080/");
        let locator = store
            .upload("avatars", "a.png", "image/png".into(), vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(locator, "avatars/a.png");
        assert_eq!(
            store.public_url("avatars", "a.png"),
            "http://localhost:8080/avatars/a.png"
        );
        let object = store.fetch("avatars", "a.png").await.unwrap().unwrap();
        assert_eq!(object.bytes, vec![1, 2, 3]);
        assert!(store.fetch("avatars", "b.png").await.unwrap().is_none());
    }
}
