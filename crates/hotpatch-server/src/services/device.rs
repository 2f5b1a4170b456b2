//! Device registration and installation tracking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use hotpatch_core::db::unix_timestamp;

use crate::storage::models::{Device, Installation};
use crate::storage::Database;

use super::ServiceError;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDeviceRequest {
    pub device_id: String,
    pub app_id: String,
    pub platform: String,
    #[serde(default)]
    pub current_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportInstallationRequest {
    pub device_id: String,
    pub release_id: String,
    pub status: String,
    #[serde(default)]
    pub is_patch: bool,
    #[serde(default)]
    pub download_size: i64,
}

/// A page of devices.
#[derive(Debug, Serialize)]
pub struct DevicePage {
    pub devices: Vec<Device>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

const INSTALLATION_STATUSES: [&str; 3] = ["applied", "failed", "rolled_back"];

#[derive(Clone)]
pub struct DeviceService {
    db: Database,
}

impl DeviceService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a new device or refresh an existing one's version and
    /// last-seen timestamp. Upsert keyed on the SDK-generated `device_id`.
    #[instrument(skip(self, req), fields(device_id = %req.device_id))]
    pub async fn register_or_update(
        &self,
        req: &RegisterDeviceRequest,
    ) -> Result<Device, ServiceError> {
        if req.device_id.is_empty() {
            return Err(ServiceError::Validation("device_id is required".to_string()));
        }
        if req.app_id.is_empty() {
            return Err(ServiceError::Validation("app_id is required".to_string()));
        }

        Ok(self
            .db
            .upsert_device(&req.device_id, &req.app_id, &req.platform, &req.current_version)
            .await?)
    }

    /// Record an installation outcome reported by the SDK.
    #[instrument(skip(self, req), fields(device_id = %req.device_id, status = %req.status))]
    pub async fn report_installation(
        &self,
        req: &ReportInstallationRequest,
    ) -> Result<Installation, ServiceError> {
        if !INSTALLATION_STATUSES.contains(&req.status.as_str()) {
            return Err(ServiceError::Validation(format!(
                "status must be one of applied, failed, rolled_back; got {}",
                req.status
            )));
        }

        let device = self.db.get_device_by_device_id(&req.device_id).await?;

        let installation = Installation {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: device.id,
            release_id: req.release_id.clone(),
            status: req.status.clone(),
            is_patch: req.is_patch,
            download_size: req.download_size,
            installed_at: unix_timestamp(),
        };

        self.db.create_installation(&installation).await?;

        Ok(installation)
    }

    /// List devices for an app, most recently seen first.
    pub async fn list(
        &self,
        app_id: &str,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<DevicePage, ServiceError> {
        let page = page.unwrap_or(1).max(1);
        let per_page = match per_page {
            Some(n) if (1..=100).contains(&n) => n,
            _ => 20,
        };

        let (devices, total) = self
            .db
            .list_devices(app_id, per_page, (page - 1) * per_page)
            .await?;

        Ok(DevicePage {
            devices,
            total,
            page,
            per_page,
        })
    }

    /// Installation counts grouped by status for a release.
    pub async fn installation_stats(
        &self,
        release_id: &str,
    ) -> Result<HashMap<String, i64>, ServiceError> {
        Ok(self.db.count_installations_by_status(release_id).await?)
    }
}
