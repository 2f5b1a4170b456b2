//! Release and patch queries for the HotPatch server.

use super::db::Database;
use super::models::{Patch, Release, ReleaseWithPatches};
use super::DatabaseError;

impl Database {
    // =========================================================================
    // Release queries
    // =========================================================================

    /// Insert a release as active and deactivate every other release in the
    /// same (app, channel), in a single transaction so hot-path readers never
    /// settle on a stale row after the commit.
    pub async fn insert_release_activated(&self, release: &Release) -> Result<(), DatabaseError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO releases (id, app_id, version, channel, bundle_url, hash, signature, \
             mandatory, rollout_percentage, is_encrypted, is_patch, base_version, key_id, size, \
             is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&release.id)
        .bind(&release.app_id)
        .bind(&release.version)
        .bind(&release.channel)
        .bind(&release.bundle_url)
        .bind(&release.hash)
        .bind(&release.signature)
        .bind(release.mandatory)
        .bind(release.rollout_percentage)
        .bind(release.is_encrypted)
        .bind(release.is_patch)
        .bind(&release.base_version)
        .bind(&release.key_id)
        .bind(release.size)
        .bind(release.is_active)
        .bind(release.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE releases SET is_active = 0 \
             WHERE app_id = ? AND channel = ? AND is_active = 1 AND id != ?",
        )
        .bind(&release.app_id)
        .bind(&release.channel)
        .bind(&release.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Get a release by ID.
    pub async fn get_release(&self, id: &str) -> Result<Release, DatabaseError> {
        sqlx::query_as::<_, Release>("SELECT * FROM releases WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Release {id}")))
    }

    /// Get the active release for an (app, channel), patches included.
    ///
    /// Ties between transiently co-active rows are broken by latest creation
    /// time. Returns `Ok(None)` when the channel has no active release.
    pub async fn get_active_release(
        &self,
        app_id: &str,
        channel: &str,
    ) -> Result<Option<ReleaseWithPatches>, DatabaseError> {
        let release = sqlx::query_as::<_, Release>(
            "SELECT * FROM releases WHERE app_id = ? AND channel = ? AND is_active = 1 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(app_id)
        .bind(channel)
        .fetch_optional(self.pool())
        .await?;

        let Some(release) = release else {
            return Ok(None);
        };

        let patches = self.list_patches(&release.id).await?;
        Ok(Some(ReleaseWithPatches { release, patches }))
    }

    /// Check whether a version already exists for an (app, channel).
    pub async fn release_version_exists(
        &self,
        app_id: &str,
        channel: &str,
        version: &str,
    ) -> Result<bool, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM releases WHERE app_id = ? AND channel = ? AND version = ?",
        )
        .bind(app_id)
        .bind(channel)
        .bind(version)
        .fetch_one(self.pool())
        .await?;

        Ok(row.0 > 0)
    }

    /// List releases for an app with optional channel / active filters.
    pub async fn list_releases(
        &self,
        app_id: &str,
        channel: Option<&str>,
        is_active: Option<bool>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<Release>, i64), DatabaseError> {
        let mut where_clause = String::from("app_id = ?");
        if channel.is_some() {
            where_clause.push_str(" AND channel = ?");
        }
        if is_active.is_some() {
            where_clause.push_str(" AND is_active = ?");
        }

        let count_sql = format!("SELECT COUNT(*) FROM releases WHERE {where_clause}");
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(app_id);
        if let Some(ch) = channel {
            count_query = count_query.bind(ch);
        }
        if let Some(active) = is_active {
            count_query = count_query.bind(active);
        }
        let total = count_query.fetch_one(self.pool()).await?.0;

        let list_sql = format!(
            "SELECT * FROM releases WHERE {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let mut list_query = sqlx::query_as::<_, Release>(&list_sql).bind(app_id);
        if let Some(ch) = channel {
            list_query = list_query.bind(ch);
        }
        if let Some(active) = is_active {
            list_query = list_query.bind(active);
        }
        let releases = list_query
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;

        Ok((releases, total))
    }

    /// Activate the target release and deactivate all others in its channel,
    /// in a single transaction (rollback).
    pub async fn activate_release(&self, release: &Release) -> Result<(), DatabaseError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "UPDATE releases SET is_active = 0 \
             WHERE app_id = ? AND channel = ? AND is_active = 1 AND id != ?",
        )
        .bind(&release.app_id)
        .bind(&release.channel)
        .bind(&release.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE releases SET is_active = 1 WHERE id = ?")
            .bind(&release.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Update the rollout percentage for a release.
    pub async fn set_release_rollout(
        &self,
        id: &str,
        percentage: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE releases SET rollout_percentage = ? WHERE id = ?")
            .bind(percentage)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Soft-delete a release (archive). The row is kept for rollback.
    pub async fn deactivate_release(&self, id: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE releases SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    // =========================================================================
    // Patch queries
    // =========================================================================

    /// Insert a patch record for a release.
    pub async fn create_patch(&self, patch: &Patch) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO patches (id, release_id, base_version, patch_url, hash, signature, \
             size, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&patch.id)
        .bind(&patch.release_id)
        .bind(&patch.base_version)
        .bind(&patch.patch_url)
        .bind(&patch.hash)
        .bind(&patch.signature)
        .bind(patch.size)
        .bind(patch.created_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// List patches attached to a release, oldest first.
    pub async fn list_patches(&self, release_id: &str) -> Result<Vec<Patch>, DatabaseError> {
        let patches = sqlx::query_as::<_, Patch>(
            "SELECT * FROM patches WHERE release_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(release_id)
        .fetch_all(self.pool())
        .await?;

        Ok(patches)
    }

    /// Count active releases for an (app, channel). Used by invariant tests.
    pub async fn count_active_releases(
        &self,
        app_id: &str,
        channel: &str,
    ) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM releases WHERE app_id = ? AND channel = ? AND is_active = 1",
        )
        .bind(app_id)
        .bind(channel)
        .fetch_one(self.pool())
        .await?;

        Ok(row.0)
    }
}
