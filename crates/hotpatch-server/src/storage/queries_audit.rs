//! Audit trail queries for the HotPatch server.

use super::db::Database;
use super::models::AuditLog;
use super::DatabaseError;

impl Database {
    /// Append an audit entry.
    pub async fn create_audit_log(&self, entry: &AuditLog) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO audit_logs (id, app_id, actor, action, entity_id, metadata, \
             ip_address, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.app_id)
        .bind(&entry.actor)
        .bind(&entry.action)
        .bind(&entry.entity_id)
        .bind(&entry.metadata)
        .bind(&entry.ip_address)
        .bind(entry.created_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Latest audit entries for an app, newest first.
    pub async fn list_audit_logs(
        &self,
        app_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditLog>, DatabaseError> {
        let logs = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs WHERE app_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(app_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(logs)
    }
}
