//! App queries for the HotPatch server.

use hotpatch_core::db::unix_timestamp;

use super::db::Database;
use super::models::App;
use super::DatabaseError;

impl Database {
    /// Register a new app.
    pub async fn create_app(
        &self,
        id: &str,
        name: &str,
        platform: &str,
        api_key_hash: &str,
        owner_id: &str,
        tier: &str,
    ) -> Result<App, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO apps (id, name, platform, api_key_hash, owner_id, tier, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(platform)
        .bind(api_key_hash)
        .bind(owner_id)
        .bind(tier)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_app(id).await
    }

    /// Get an app by ID.
    pub async fn get_app(&self, id: &str) -> Result<App, DatabaseError> {
        sqlx::query_as::<_, App>("SELECT * FROM apps WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("App {id}")))
    }

    /// Look up an app by the SHA-256 hash of its CLI key.
    pub async fn get_app_by_key_hash(&self, api_key_hash: &str) -> Result<App, DatabaseError> {
        sqlx::query_as::<_, App>("SELECT * FROM apps WHERE api_key_hash = ?")
            .bind(api_key_hash)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound("App for key".to_string()))
    }

    /// Check whether an app name is already taken.
    pub async fn app_name_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM apps WHERE name = ?")
            .bind(name)
            .fetch_one(self.pool())
            .await?;

        Ok(row.0 > 0)
    }

    /// Update an app's tier.
    pub async fn set_app_tier(&self, id: &str, tier: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE apps SET tier = ?, updated_at = ? WHERE id = ?")
            .bind(tier)
            .bind(unix_timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }
}
