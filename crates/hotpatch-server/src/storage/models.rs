//! Data models for HotPatch storage.

use serde::{Deserialize, Serialize};

/// A registered application.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct App {
    pub id: String,
    pub name: String,
    pub platform: String,
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub owner_id: String,
    /// "free" | "pro" | "enterprise"
    pub tier: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A deployment lane within an app (e.g. "production", "beta").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: String,
    pub app_id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub auto_rollout: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A published OTA bundle release.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Release {
    pub id: String,
    pub app_id: String,
    pub version: String,
    pub channel: String,
    pub bundle_url: String,
    /// SHA-256 of the bundle, hex.
    pub hash: String,
    /// Ed25519 signature produced by the publisher; verified by the SDK.
    pub signature: String,
    pub mandatory: bool,
    pub rollout_percentage: i64,
    pub is_encrypted: bool,
    pub is_patch: bool,
    pub base_version: Option<String>,
    pub key_id: Option<String>,
    pub size: i64,
    pub is_active: bool,
    pub created_at: i64,
}

/// A binary diff attached to a release, applicable when the device's
/// current version equals `base_version`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Patch {
    pub id: String,
    pub release_id: String,
    pub base_version: String,
    pub patch_url: String,
    pub hash: String,
    pub signature: String,
    pub size: i64,
    pub created_at: i64,
}

/// An SDK installation that polls for updates.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: String,
    /// Opaque SDK-generated identifier, unique across apps.
    pub device_id: String,
    pub app_id: String,
    pub platform: String,
    pub current_version: String,
    pub last_seen: i64,
}

/// An installation-outcome record reported by the SDK.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Installation {
    pub id: String,
    pub device_id: String,
    pub release_id: String,
    /// "applied" | "failed" | "rolled_back"
    pub status: String,
    pub is_patch: bool,
    pub download_size: i64,
    pub installed_at: i64,
}

/// An outbound notification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Webhook {
    pub id: String,
    pub app_id: String,
    pub url: String,
    /// HMAC signing secret; never serialized after creation.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Comma-separated event verbs, e.g. "release.created,release.rolled_back".
    pub events: String,
    pub is_active: bool,
    pub created_at: i64,
}

impl Webhook {
    /// Whether this subscription's event set contains the given verb.
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.split(',').any(|e| e.trim() == event)
    }
}

/// An immutable record of a sensitive action.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: String,
    pub app_id: String,
    pub actor: String,
    /// Dotted action verb, e.g. "release.rollback".
    pub action: String,
    pub entity_id: String,
    pub metadata: String,
    pub ip_address: String,
    pub created_at: i64,
}

/// A release together with its attached patches, as served to the hot path
/// and cached as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseWithPatches {
    #[serde(flatten)]
    pub release: Release,
    pub patches: Vec<Patch>,
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn webhook(events: &str) -> Webhook {
        Webhook {
            id: "wh-1".to_string(),
            app_id: "app-1".to_string(),
            url: "https://example.com/hook".to_string(),
            secret: "s".to_string(),
            events: events.to_string(),
            is_active: true,
            created_at: 0,
        }
    }

    #[test]
    fn subscribes_to_exact_member() {
        let wh = webhook("release.created,release.rolled_back");
        assert!(wh.subscribes_to("release.created"));
        assert!(wh.subscribes_to("release.rolled_back"));
        assert!(!wh.subscribes_to("release.archived"));
    }

    #[test]
    fn subscribes_to_rejects_prefix_verbs() {
        // "release.rolled_back" must not match a subscription to
        // "release.rolled_back_manually" or vice versa.
        let wh = webhook("release.rolled_back_manually");
        assert!(!wh.subscribes_to("release.rolled_back"));
    }

    #[test]
    fn subscribes_to_tolerates_spaces() {
        let wh = webhook("release.created, release.rolled_back");
        assert!(wh.subscribes_to("release.rolled_back"));
    }

    #[test]
    fn webhook_secret_not_serialized() {
        let wh = webhook("release.created");
        let json = serde_json::to_value(&wh).unwrap();
        assert!(json.get("secret").is_none());
    }

    #[test]
    fn app_key_hash_not_serialized() {
        let app = App {
            id: "a".to_string(),
            name: "demo".to_string(),
            platform: "android".to_string(),
            api_key_hash: "hash".to_string(),
            owner_id: "o".to_string(),
            tier: "free".to_string(),
            created_at: 0,
            updated_at: 0,
        };
        let json = serde_json::to_value(&app).unwrap();
        assert!(json.get("api_key_hash").is_none());
    }
}
