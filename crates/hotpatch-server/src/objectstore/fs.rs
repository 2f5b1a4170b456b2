//! Local filesystem blob store.
//!
//! Development and test stand-in for [`super::S3ObjectStore`]. Objects live
//! as plain files under a root directory; "presigned" URLs are plain URLs
//! under a configured base with an advisory expiry parameter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ObjectStore, ObjectStoreError};

pub struct FsObjectStore {
    root: PathBuf,
    base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        // Keys are server-generated, but reject traversal anyway.
        if key.split('/').any(|seg| seg == "..") {
            return Err(ObjectStoreError::Io(format!("invalid object key: {key}")));
        }
        Ok(self.root.join(key))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::Io(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ObjectStoreError::Io(e.to_string()))?;

        debug!(key = %key, "Blob written");
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError> {
        Ok(format!(
            "{}/{key}?expires={}",
            self.base_url,
            ttl.as_secs()
        ))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::Io(e.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_store() -> FsObjectStore {
        let root = std::env::temp_dir()
            .join("hotpatch-test")
            .join(uuid::Uuid::new_v4().to_string());
        FsObjectStore::new(root, "http://localhost:8080/blobs")
    }

    #[tokio::test]
    async fn put_then_read_back() {
        let store = test_store();
        store
            .put("bundles/app/android/production/1.0.0.zip", b"bundle".to_vec(), "application/zip")
            .await
            .unwrap();

        let on_disk = tokio::fs::read(
            store.root().join("bundles/app/android/production/1.0.0.zip"),
        )
        .await
        .unwrap();
        assert_eq!(on_disk, b"bundle");
    }

    #[tokio::test]
    async fn presign_builds_url_under_base() {
        let store = test_store();
        let url = store
            .presign("bundles/app/1.zip", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8080/blobs/bundles/app/1.zip?expires=3600");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = test_store();
        store
            .put("patches/x/from-1.patch", b"p".to_vec(), "application/octet-stream")
            .await
            .unwrap();
        store.delete("patches/x/from-1.patch").await.unwrap();
        // Second delete of a missing object is fine
        store.delete("patches/x/from-1.patch").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let store = test_store();
        let err = store
            .put("../outside", b"x".to_vec(), "application/octet-stream")
            .await;
        assert!(err.is_err());
    }
}
