//! Object storage for release bundles and patches.
//!
//! [`ObjectStore`] is a capability interface: the release pipeline only ever
//! sees `put` / `presign` / `delete`, so an S3-compatible backend and the
//! local filesystem store are interchangeable.

use std::time::Duration;

use async_trait::async_trait;

mod fs;
mod s3;
mod sigv4;

pub use fs::FsObjectStore;
pub use s3::S3ObjectStore;

/// Errors from object storage backends.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Backend returned status {status}: {body}")]
    Backend { status: u16, body: String },
}

/// Blob storage over an S3-compatible backend (or a local stand-in).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under `key`.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    /// Produce a time-limited download URL for `key`.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, ObjectStoreError>;

    /// Remove an object.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// Object key for a release bundle.
pub fn bundle_key(app_id: &str, platform: &str, channel: &str, version: &str) -> String {
    format!("bundles/{app_id}/{platform}/{channel}/{version}.zip")
}

/// Object key for a patch artifact.
pub fn patch_key(app_id: &str, release_id: &str, base_version: &str) -> String {
    format!("patches/{app_id}/{release_id}/from-{base_version}.patch")
}

/// Presigned URL lifetime for bundle and patch downloads.
pub const PRESIGN_TTL: Duration = Duration::from_secs(60 * 60);
