//! Channel management with tier-aware invariants.

use serde::Deserialize;
use tracing::{info, instrument};

use crate::storage::models::Channel;
use crate::storage::{Database, DatabaseError};

use super::ServiceError;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub auto_rollout: Option<bool>,
}

/// The three lanes every app starts with.
const DEFAULT_CHANNELS: [(&str, &str, &str); 3] = [
    ("Production", "production", "Main release channel for all users."),
    ("Staging", "staging", "Internal testing and QA channel."),
    ("Beta", "beta", "Early access channel for beta testers."),
];

#[derive(Clone)]
pub struct ChannelService {
    db: Database,
}

impl ChannelService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a channel, enforcing slug shape, per-app uniqueness, and
    /// tier limits (free: 1, pro: 3, enterprise: unlimited).
    #[instrument(skip(self, req), fields(app_id = %app_id, slug = %req.slug))]
    pub async fn create(
        &self,
        app_id: &str,
        req: &CreateChannelRequest,
    ) -> Result<Channel, ServiceError> {
        if req.name.is_empty() {
            return Err(ServiceError::Validation("name is required".to_string()));
        }
        if req.slug.is_empty()
            || !req
                .slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ServiceError::Validation(
                "slug must be lowercase alphanumeric".to_string(),
            ));
        }

        let app = self.db.get_app(app_id).await?;
        let count = self.db.count_channels(app_id).await?;
        match app.tier.as_str() {
            "free" if count >= 1 => {
                return Err(ServiceError::Forbidden(
                    "free tier apps are limited to 1 channel (Production)".to_string(),
                ));
            }
            "pro" if count >= 3 => {
                return Err(ServiceError::Forbidden(
                    "pro tier apps are limited to 3 channels".to_string(),
                ));
            }
            _ => {}
        }

        if self.db.get_channel_by_slug(app_id, &req.slug).await.is_ok() {
            return Err(ServiceError::Conflict(format!(
                "channel with slug '{}' already exists for this application",
                req.slug
            )));
        }

        let channel = self
            .db
            .create_channel(
                &uuid::Uuid::new_v4().to_string(),
                app_id,
                &req.name,
                &req.slug,
                &req.description,
            )
            .await?;

        info!(channel = %channel.slug, "Channel created");
        Ok(channel)
    }

    /// List all channels for an app.
    pub async fn list(&self, app_id: &str) -> Result<Vec<Channel>, ServiceError> {
        Ok(self.db.list_channels(app_id).await?)
    }

    /// Get a channel by slug.
    pub async fn get(&self, app_id: &str, slug: &str) -> Result<Channel, ServiceError> {
        Ok(self.db.get_channel_by_slug(app_id, slug).await?)
    }

    /// Modify channel details.
    pub async fn update(
        &self,
        app_id: &str,
        slug: &str,
        req: &UpdateChannelRequest,
    ) -> Result<Channel, ServiceError> {
        let mut channel = self.db.get_channel_by_slug(app_id, slug).await?;

        if let Some(name) = &req.name {
            channel.name = name.clone();
        }
        if let Some(description) = &req.description {
            channel.description = description.clone();
        }
        if let Some(auto_rollout) = req.auto_rollout {
            channel.auto_rollout = auto_rollout;
        }

        self.db.update_channel(&channel).await?;
        Ok(channel)
    }

    /// Delete a channel. The `production` channel is undeletable.
    #[instrument(skip(self), fields(app_id = %app_id, slug = %slug))]
    pub async fn delete(&self, app_id: &str, slug: &str) -> Result<(), ServiceError> {
        let channel = self.db.get_channel_by_slug(app_id, slug).await?;

        if channel.slug == "production" {
            return Err(ServiceError::Forbidden(
                "the production channel cannot be deleted".to_string(),
            ));
        }

        self.db.delete_channel(&channel.id).await?;
        Ok(())
    }

    /// Seed {production, staging, beta} for an app. Idempotent: existing
    /// channels are left untouched.
    pub async fn ensure_defaults(&self, app_id: &str) -> Result<(), ServiceError> {
        for (name, slug, description) in DEFAULT_CHANNELS {
            match self.db.get_channel_by_slug(app_id, slug).await {
                Ok(_) => {}
                Err(DatabaseError::NotFound(_)) => {
                    self.db
                        .create_channel(
                            &uuid::Uuid::new_v4().to_string(),
                            app_id,
                            name,
                            slug,
                            description,
                        )
                        .await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
