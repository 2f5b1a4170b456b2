//! Webhook subscription queries for the HotPatch server.

use hotpatch_core::db::unix_timestamp;

use super::db::Database;
use super::models::Webhook;
use super::DatabaseError;

impl Database {
    /// Create a webhook subscription.
    pub async fn create_webhook(
        &self,
        id: &str,
        app_id: &str,
        url: &str,
        secret: &str,
        events: &str,
    ) -> Result<Webhook, DatabaseError> {
        sqlx::query(
            "INSERT INTO webhooks (id, app_id, url, secret, events, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(id)
        .bind(app_id)
        .bind(url)
        .bind(secret)
        .bind(events)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        self.get_webhook(id).await
    }

    /// Get a webhook by ID.
    pub async fn get_webhook(&self, id: &str) -> Result<Webhook, DatabaseError> {
        sqlx::query_as::<_, Webhook>("SELECT * FROM webhooks WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Webhook {id}")))
    }

    /// List all webhook subscriptions for an app.
    pub async fn list_webhooks(&self, app_id: &str) -> Result<Vec<Webhook>, DatabaseError> {
        let webhooks = sqlx::query_as::<_, Webhook>(
            "SELECT * FROM webhooks WHERE app_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(app_id)
        .fetch_all(self.pool())
        .await?;

        Ok(webhooks)
    }

    /// List active webhook subscriptions for an app (dispatch path).
    pub async fn list_active_webhooks(&self, app_id: &str) -> Result<Vec<Webhook>, DatabaseError> {
        let webhooks = sqlx::query_as::<_, Webhook>(
            "SELECT * FROM webhooks WHERE app_id = ? AND is_active = 1",
        )
        .bind(app_id)
        .fetch_all(self.pool())
        .await?;

        Ok(webhooks)
    }

    /// Delete a webhook scoped to an app.
    pub async fn delete_webhook(&self, app_id: &str, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM webhooks WHERE app_id = ? AND id = ?")
            .bind(app_id)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
