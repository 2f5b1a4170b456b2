//! Webhook subscription management.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::audit::AuditRecorder;
use crate::auth::generate_webhook_secret;
use crate::storage::models::Webhook;
use crate::storage::Database;

use super::ServiceError;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWebhookRequest {
    pub url: String,
    pub events: Vec<String>,
}

/// Creation response: the only place the signing secret is ever returned.
#[derive(Debug, Serialize)]
pub struct CreatedWebhook {
    #[serde(flatten)]
    pub webhook: Webhook,
    pub secret: String,
}

#[derive(Clone)]
pub struct WebhookService {
    db: Database,
    audit: AuditRecorder,
}

impl WebhookService {
    pub fn new(db: Database, audit: AuditRecorder) -> Self {
        Self { db, audit }
    }

    /// Create a subscription with a server-generated HMAC secret.
    #[instrument(skip(self, req), fields(app_id = %app_id, url = %req.url))]
    pub async fn create(
        &self,
        app_id: &str,
        req: &CreateWebhookRequest,
    ) -> Result<CreatedWebhook, ServiceError> {
        if !req.url.starts_with("http://") && !req.url.starts_with("https://") {
            return Err(ServiceError::Validation(
                "url must be an http(s) URL".to_string(),
            ));
        }
        if req.events.is_empty() {
            return Err(ServiceError::Validation(
                "at least one event is required".to_string(),
            ));
        }

        let secret = generate_webhook_secret();
        let webhook = self
            .db
            .create_webhook(
                &uuid::Uuid::new_v4().to_string(),
                app_id,
                &req.url,
                &secret,
                &req.events.join(","),
            )
            .await?;

        self.audit
            .record(
                app_id,
                "system",
                "webhook.create",
                &webhook.id,
                &format!("URL: {}", webhook.url),
                "",
            )
            .await;

        Ok(CreatedWebhook { webhook, secret })
    }

    /// List subscriptions for an app.
    pub async fn list(&self, app_id: &str) -> Result<Vec<Webhook>, ServiceError> {
        Ok(self.db.list_webhooks(app_id).await?)
    }

    /// Delete a subscription.
    pub async fn delete(&self, app_id: &str, webhook_id: &str) -> Result<(), ServiceError> {
        if !self.db.delete_webhook(app_id, webhook_id).await? {
            return Err(ServiceError::NotFound(format!(
                "webhook {webhook_id} not found"
            )));
        }

        self.audit
            .record(app_id, "system", "webhook.delete", webhook_id, "", "")
            .await;

        Ok(())
    }
}
