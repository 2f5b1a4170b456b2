//! Channel queries for the HotPatch server.

use hotpatch_core::db::unix_timestamp;

use super::db::Database;
use super::models::Channel;
use super::DatabaseError;

impl Database {
    /// Create a new channel.
    pub async fn create_channel(
        &self,
        id: &str,
        app_id: &str,
        name: &str,
        slug: &str,
        description: &str,
    ) -> Result<Channel, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO channels (id, app_id, name, slug, description, auto_rollout, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id)
        .bind(app_id)
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_channel_by_slug(app_id, slug).await
    }

    /// Get a channel by slug within an app.
    pub async fn get_channel_by_slug(
        &self,
        app_id: &str,
        slug: &str,
    ) -> Result<Channel, DatabaseError> {
        sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE app_id = ? AND slug = ?")
            .bind(app_id)
            .bind(slug)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Channel {slug}")))
    }

    /// List all channels for an app, oldest first.
    pub async fn list_channels(&self, app_id: &str) -> Result<Vec<Channel>, DatabaseError> {
        let channels = sqlx::query_as::<_, Channel>(
            "SELECT * FROM channels WHERE app_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(app_id)
        .fetch_all(self.pool())
        .await?;

        Ok(channels)
    }

    /// Count channels for an app.
    pub async fn count_channels(&self, app_id: &str) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM channels WHERE app_id = ?")
            .bind(app_id)
            .fetch_one(self.pool())
            .await?;

        Ok(row.0)
    }

    /// Update channel name / description / auto-rollout.
    pub async fn update_channel(&self, channel: &Channel) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE channels SET name = ?, description = ?, auto_rollout = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&channel.name)
        .bind(&channel.description)
        .bind(channel.auto_rollout)
        .bind(unix_timestamp())
        .bind(&channel.id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Delete a channel by ID.
    pub async fn delete_channel(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM channels WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
