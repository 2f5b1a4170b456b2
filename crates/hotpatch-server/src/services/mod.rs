//! Business logic services for the HotPatch server.

mod app;
mod channel;
mod device;
mod release;
mod update;
mod webhook;

pub use app::{AppService, RegisterAppRequest, RegisteredApp, TokenResponse};
pub use channel::{ChannelService, CreateChannelRequest, UpdateChannelRequest};
pub use device::{DeviceService, RegisterDeviceRequest, ReportInstallationRequest};
pub use release::{ListReleasesQuery, PatchMetadata, PublishRequest, ReleaseService};
pub use update::{UpdateCheckRequest, UpdateCheckResponse, UpdateService};
pub use webhook::{CreateWebhookRequest, CreatedWebhook, WebhookService};

use hotpatch_core::db::DatabaseError;

use crate::objectstore::ObjectStoreError;

/// Error kinds surfaced to API callers.
///
/// The API layer maps each variant onto a status code and an
/// `{"error": "..."}` body; services never format HTTP concerns themselves.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Rate limit exceeded. Try again later.")]
    RateLimited,

    #[error("{0}")]
    Internal(String),
}

impl From<DatabaseError> for ServiceError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ObjectStoreError> for ServiceError {
    fn from(e: ObjectStoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn db_not_found_maps_to_not_found() {
        let err: ServiceError = DatabaseError::NotFound("Release r-1".to_string()).into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn db_query_error_maps_to_internal() {
        let err: ServiceError = DatabaseError::Query("locked".to_string()).into();
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}
