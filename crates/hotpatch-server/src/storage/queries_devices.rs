//! Device and installation queries for the HotPatch server.

use std::collections::HashMap;

use hotpatch_core::db::unix_timestamp;

use super::db::Database;
use super::models::{Device, Installation};
use super::DatabaseError;

impl Database {
    /// Create or refresh a device record keyed on the SDK-generated
    /// `device_id`. On conflict, `current_version` and `last_seen` are
    /// updated and the existing internal id is kept.
    pub async fn upsert_device(
        &self,
        device_id: &str,
        app_id: &str,
        platform: &str,
        current_version: &str,
    ) -> Result<Device, DatabaseError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO devices (id, device_id, app_id, platform, current_version, last_seen) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(device_id) DO UPDATE SET current_version = excluded.current_version, \
             last_seen = excluded.last_seen",
        )
        .bind(&id)
        .bind(device_id)
        .bind(app_id)
        .bind(platform)
        .bind(current_version)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_device_by_device_id(device_id).await
    }

    /// Find a device by its SDK-generated string ID.
    pub async fn get_device_by_device_id(&self, device_id: &str) -> Result<Device, DatabaseError> {
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE device_id = ?")
            .bind(device_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Device {device_id}")))
    }

    /// List devices for an app, most recently seen first.
    pub async fn list_devices(
        &self,
        app_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Device>, i64), DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM devices WHERE app_id = ?")
            .bind(app_id)
            .fetch_one(self.pool())
            .await?;

        let devices = sqlx::query_as::<_, Device>(
            "SELECT * FROM devices WHERE app_id = ? ORDER BY last_seen DESC LIMIT ? OFFSET ?",
        )
        .bind(app_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok((devices, row.0))
    }

    /// Record an installation outcome (applied/failed/rolled_back).
    pub async fn create_installation(
        &self,
        installation: &Installation,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO installations (id, device_id, release_id, status, is_patch, \
             download_size, installed_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&installation.id)
        .bind(&installation.device_id)
        .bind(&installation.release_id)
        .bind(&installation.status)
        .bind(installation.is_patch)
        .bind(installation.download_size)
        .bind(installation.installed_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Installation counts grouped by status for a release.
    pub async fn count_installations_by_status(
        &self,
        release_id: &str,
    ) -> Result<HashMap<String, i64>, DatabaseError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM installations WHERE release_id = ? GROUP BY status",
        )
        .bind(release_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().collect())
    }
}
