//! Append-only audit trail.
//!
//! Audit writes are fire-and-forget: a failed write is logged and swallowed,
//! never propagated, so business operations cannot be aborted by the trail.

use tracing::warn;

use hotpatch_core::db::unix_timestamp;

use crate::storage::models::AuditLog;
use crate::storage::Database;

/// Maximum rows returned by the audit listing endpoint.
pub const AUDIT_LIST_CAP: u32 = 50;

#[derive(Clone)]
pub struct AuditRecorder {
    db: Database,
}

impl AuditRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append an audit entry. Never fails from the caller's perspective.
    pub async fn record(
        &self,
        app_id: &str,
        actor: &str,
        action: &str,
        entity_id: &str,
        metadata: &str,
        ip: &str,
    ) {
        let entry = AuditLog {
            id: uuid::Uuid::new_v4().to_string(),
            app_id: app_id.to_string(),
            actor: actor.to_string(),
            action: action.to_string(),
            entity_id: entity_id.to_string(),
            metadata: metadata.to_string(),
            ip_address: ip.to_string(),
            created_at: unix_timestamp(),
        };

        if let Err(e) = self.db.create_audit_log(&entry).await {
            warn!(error = %e, action = %action, "Audit write failed");
        }
    }

    /// Latest entries for an app, capped at [`AUDIT_LIST_CAP`].
    pub async fn list(&self, app_id: &str) -> Vec<AuditLog> {
        match self.db.list_audit_logs(app_id, AUDIT_LIST_CAP).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!(error = %e, "Audit listing failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_and_list() {
        let db = Database::open_in_memory().await.unwrap();
        let audit = AuditRecorder::new(db);

        audit
            .record("app-1", "system", "release.create", "rel-1", "Version: 1.0.0", "")
            .await;
        audit
            .record("app-1", "system", "release.rollback", "rel-1", "", "")
            .await;

        let logs = audit.list("app-1").await;
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().any(|l| l.action == "release.create"));
    }

    #[tokio::test]
    async fn listing_is_capped_at_50() {
        let db = Database::open_in_memory().await.unwrap();
        let audit = AuditRecorder::new(db);

        for i in 0..60 {
            audit
                .record("app-1", "system", "release.create", &format!("rel-{i}"), "", "")
                .await;
        }

        let logs = audit.list("app-1").await;
        assert_eq!(logs.len(), 50);
    }
}
