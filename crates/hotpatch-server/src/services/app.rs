//! App registration and bearer-token exchange.
//!
//! Account management proper (users, payments) lives elsewhere; this service
//! only covers the surface the delivery pipeline needs: creating an app with
//! a hashed CLI key and seeded default channels, and exchanging that key for
//! a bearer token.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::audit::AuditRecorder;
use crate::auth::{generate_api_key, JwtManager};
use crate::storage::models::App;
use crate::storage::Database;

use super::channel::ChannelService;
use super::ServiceError;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAppRequest {
    pub name: String,
    pub platform: String,
    #[serde(default)]
    pub tier: Option<String>,
}

/// Registration response. `api_key` is the raw CLI key, returned exactly once.
#[derive(Debug, Serialize)]
pub struct RegisteredApp {
    #[serde(flatten)]
    pub app: App,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

const TIERS: [&str; 3] = ["free", "pro", "enterprise"];
const PLATFORMS: [&str; 2] = ["android", "ios"];

#[derive(Clone)]
pub struct AppService {
    db: Database,
    channels: ChannelService,
    jwt: JwtManager,
    audit: AuditRecorder,
}

impl AppService {
    pub fn new(db: Database, channels: ChannelService, jwt: JwtManager, audit: AuditRecorder) -> Self {
        Self {
            db,
            channels,
            jwt,
            audit,
        }
    }

    /// Create an app with a fresh CLI key and the default channel set.
    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn register(&self, req: &RegisterAppRequest) -> Result<RegisteredApp, ServiceError> {
        if req.name.is_empty() {
            return Err(ServiceError::Validation("name is required".to_string()));
        }
        if !PLATFORMS.contains(&req.platform.as_str()) {
            return Err(ServiceError::Validation(
                "platform must be android or ios".to_string(),
            ));
        }
        let tier = req.tier.as_deref().unwrap_or("free");
        if !TIERS.contains(&tier) {
            return Err(ServiceError::Validation(
                "tier must be free, pro, or enterprise".to_string(),
            ));
        }

        if self.db.app_name_exists(&req.name).await? {
            return Err(ServiceError::Conflict(format!(
                "an app named '{}' already exists",
                req.name
            )));
        }

        let raw_key = generate_api_key();
        let app_id = uuid::Uuid::new_v4().to_string();
        let app = self
            .db
            .create_app(
                &app_id,
                &req.name,
                &req.platform,
                &JwtManager::hash_key(&raw_key),
                // Owner accounts are managed by the external auth system
                "system",
                tier,
            )
            .await?;

        self.channels.ensure_defaults(&app_id).await?;

        self.audit
            .record(&app_id, "system", "app.create", &app_id, &format!("Name: {}", req.name), "")
            .await;

        info!(app_id = %app_id, tier = %tier, "App registered");
        Ok(RegisteredApp { app, api_key: raw_key })
    }

    /// Exchange an app's CLI key for a bearer token.
    #[instrument(skip(self, raw_key), fields(app_id = %app_id))]
    pub async fn issue_token(
        &self,
        app_id: &str,
        raw_key: &str,
    ) -> Result<TokenResponse, ServiceError> {
        let app = self
            .db
            .get_app_by_key_hash(&JwtManager::hash_key(raw_key))
            .await
            .map_err(|_| ServiceError::Unauthenticated("invalid app credentials".to_string()))?;

        if app.id != app_id {
            warn!("CLI key does not belong to the requested app");
            return Err(ServiceError::Unauthenticated(
                "invalid app credentials".to_string(),
            ));
        }

        let (access_token, expires_in) = self
            .jwt
            .issue_token(&app.id, &app.name)
            .map_err(|e| ServiceError::Internal(format!("token creation failed: {e}")))?;

        Ok(TokenResponse {
            access_token,
            expires_in,
        })
    }

    /// Get an app by ID.
    pub async fn get(&self, app_id: &str) -> Result<App, ServiceError> {
        Ok(self.db.get_app(app_id).await?)
    }
}
