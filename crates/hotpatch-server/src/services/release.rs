//! Release publication, rollback, rollout, archive, and patch attachment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use hotpatch_core::db::unix_timestamp;

use crate::audit::AuditRecorder;
use crate::cache::{active_release_key, CacheLayer};
use crate::objectstore::{bundle_key, patch_key, ObjectStore, PRESIGN_TTL};
use crate::storage::models::{Patch, Release};
use crate::storage::Database;
use crate::webhooks::{WebhookDispatcher, EVENT_RELEASE_CREATED, EVENT_RELEASE_ROLLED_BACK};

use super::update::is_version_greater;
use super::ServiceError;

/// Metadata accompanying a bundle upload.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishRequest {
    pub version: String,
    #[serde(default)]
    pub channel: String,
    pub platform: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub rollout_percentage: i64,
    pub hash: String,
    pub signature: String,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub is_patch: bool,
    #[serde(default)]
    pub base_version: Option<String>,
    #[serde(default)]
    pub key_id: Option<String>,
    pub size: i64,
}

/// Metadata accompanying a patch upload.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchMetadata {
    pub base_version: String,
    pub hash: String,
    pub signature: String,
    pub size: i64,
}

/// Filters for the release listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListReleasesQuery {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// A page of releases.
#[derive(Debug, Serialize)]
pub struct ReleasePage {
    pub releases: Vec<Release>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Clone)]
pub struct ReleaseService {
    db: Database,
    store: Arc<dyn ObjectStore>,
    cache: Option<Arc<dyn CacheLayer>>,
    webhooks: WebhookDispatcher,
    audit: AuditRecorder,
}

impl ReleaseService {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        cache: Option<Arc<dyn CacheLayer>>,
        webhooks: WebhookDispatcher,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            db,
            store,
            cache,
            webhooks,
            audit,
        }
    }

    async fn invalidate_cache(&self, app_id: &str, channel: &str) {
        if let Some(cache) = &self.cache {
            cache.del(&active_release_key(app_id, channel)).await;
        }
    }

    /// Validate and store a new release: upload the bundle, insert the row as
    /// active while deactivating the previous one, invalidate the cache,
    /// dispatch `release.created`, and append an audit entry.
    #[instrument(skip(self, req, bundle), fields(app_id = %app_id, version = %req.version))]
    pub async fn publish(
        &self,
        app_id: &str,
        req: &PublishRequest,
        bundle: Vec<u8>,
    ) -> Result<Release, ServiceError> {
        if req.version.is_empty() {
            return Err(ServiceError::Validation("version is required".to_string()));
        }
        if req.is_patch && req.base_version.as_deref().unwrap_or("").is_empty() {
            return Err(ServiceError::Validation(
                "base_version is required for patch releases".to_string(),
            ));
        }

        let channel = if req.channel.is_empty() {
            "production"
        } else {
            req.channel.as_str()
        };
        let rollout = if req.rollout_percentage == 0 {
            100
        } else {
            req.rollout_percentage
        };
        if !(1..=100).contains(&rollout) {
            return Err(ServiceError::Validation(
                "rollout_percentage must be between 1 and 100".to_string(),
            ));
        }

        if self
            .db
            .release_version_exists(app_id, channel, &req.version)
            .await?
        {
            return Err(ServiceError::Conflict(format!(
                "version {} already exists for channel {channel}",
                req.version
            )));
        }

        let app = self.db.get_app(app_id).await?;
        if app.tier == "free" && rollout < 100 {
            return Err(ServiceError::Forbidden(format!(
                "phased rollout (percentage < 100) is a Pro feature. Current tier: {}",
                app.tier
            )));
        }

        // Monotonic versioning against the current active release
        if let Some(active) = self.db.get_active_release(app_id, channel).await? {
            if !is_version_greater(&req.version, &active.release.version) {
                return Err(ServiceError::Conflict(format!(
                    "monotonic versioning enforced: new version {} must be greater than current active version {}",
                    req.version, active.release.version
                )));
            }
        }

        let object_key = bundle_key(app_id, &req.platform, channel, &req.version);
        self.store
            .put(&object_key, bundle, "application/zip")
            .await?;

        let bundle_url = self.store.presign(&object_key, PRESIGN_TTL).await?;

        let release = Release {
            id: uuid::Uuid::new_v4().to_string(),
            app_id: app_id.to_string(),
            version: req.version.clone(),
            channel: channel.to_string(),
            bundle_url,
            hash: req.hash.clone(),
            signature: req.signature.clone(),
            mandatory: req.mandatory,
            rollout_percentage: rollout,
            is_encrypted: req.is_encrypted,
            is_patch: req.is_patch,
            base_version: req.base_version.clone(),
            key_id: req.key_id.clone(),
            size: req.size,
            is_active: true,
            created_at: unix_timestamp(),
        };

        self.db.insert_release_activated(&release).await?;

        self.invalidate_cache(app_id, channel).await;

        self.webhooks.dispatch(
            app_id,
            EVENT_RELEASE_CREATED,
            serde_json::to_value(&release).unwrap_or_default(),
        );

        self.audit
            .record(
                app_id,
                "system",
                "release.create",
                &release.id,
                &format!("Version: {}, Channel: {}", release.version, release.channel),
                "",
            )
            .await;

        info!(release_id = %release.id, channel = %release.channel, "Release published");
        Ok(release)
    }

    /// Get a release by ID.
    pub async fn get(&self, release_id: &str) -> Result<Release, ServiceError> {
        Ok(self.db.get_release(release_id).await?)
    }

    /// List releases with filters and pagination.
    pub async fn list(
        &self,
        app_id: &str,
        query: &ListReleasesQuery,
    ) -> Result<ReleasePage, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = match query.per_page {
            Some(n) if (1..=100).contains(&n) => n,
            _ => 20,
        };

        let (releases, total) = self
            .db
            .list_releases(
                app_id,
                query.channel.as_deref(),
                query.is_active,
                per_page,
                (page - 1) * per_page,
            )
            .await?;

        Ok(ReleasePage {
            releases,
            total,
            page,
            per_page,
        })
    }

    /// Designate a previous release as the active one for its channel.
    /// Archived releases remain eligible targets.
    #[instrument(skip(self), fields(release_id = %release_id))]
    pub async fn rollback(&self, release_id: &str) -> Result<Release, ServiceError> {
        let mut release = self.db.get_release(release_id).await?;

        self.db.activate_release(&release).await?;
        release.is_active = true;

        self.invalidate_cache(&release.app_id, &release.channel).await;

        self.webhooks.dispatch(
            &release.app_id,
            EVENT_RELEASE_ROLLED_BACK,
            serde_json::to_value(&release).unwrap_or_default(),
        );

        self.audit
            .record(
                &release.app_id,
                "system",
                "release.rollback",
                &release.id,
                &format!("Target Version: {}", release.version),
                "",
            )
            .await;

        info!(version = %release.version, channel = %release.channel, "Release rolled back");
        Ok(release)
    }

    /// Change the rollout percentage for a release.
    #[instrument(skip(self), fields(release_id = %release_id, percentage))]
    pub async fn update_rollout(
        &self,
        release_id: &str,
        percentage: i64,
    ) -> Result<(), ServiceError> {
        if !(1..=100).contains(&percentage) {
            return Err(ServiceError::Validation(
                "rollout_percentage must be between 1 and 100".to_string(),
            ));
        }

        let release = self.db.get_release(release_id).await?;

        let app = self.db.get_app(&release.app_id).await?;
        if app.tier == "free" && percentage < 100 {
            return Err(ServiceError::Forbidden(
                "phased rollout is a Pro feature. Free apps must stay at 100%".to_string(),
            ));
        }

        self.db.set_release_rollout(release_id, percentage).await?;

        self.invalidate_cache(&release.app_id, &release.channel).await;

        self.audit
            .record(
                &release.app_id,
                "system",
                "release.update_rollout",
                release_id,
                &format!("Rollout set to {percentage}%"),
                "",
            )
            .await;

        Ok(())
    }

    /// Archive (soft-delete) a release. The bundle object is kept.
    #[instrument(skip(self), fields(release_id = %release_id))]
    pub async fn archive(&self, release_id: &str) -> Result<(), ServiceError> {
        let release = self.db.get_release(release_id).await?;

        self.db.deactivate_release(release_id).await?;

        self.invalidate_cache(&release.app_id, &release.channel).await;

        self.audit
            .record(&release.app_id, "system", "release.archive", release_id, "", "")
            .await;

        Ok(())
    }

    /// Upload a patch artifact and attach it to a release.
    #[instrument(skip(self, meta, patch_bytes), fields(release_id = %release_id))]
    pub async fn attach_patch(
        &self,
        release_id: &str,
        meta: &PatchMetadata,
        patch_bytes: Vec<u8>,
    ) -> Result<Patch, ServiceError> {
        if meta.base_version.is_empty() {
            return Err(ServiceError::Validation(
                "base_version is required".to_string(),
            ));
        }

        let release = self.db.get_release(release_id).await?;

        let app = self.db.get_app(&release.app_id).await?;
        if app.tier == "free" {
            return Err(ServiceError::Forbidden(format!(
                "differential patching is a Pro feature. Current tier: {}",
                app.tier
            )));
        }

        // One patch per base version
        let existing = self.db.list_patches(release_id).await?;
        if existing.iter().any(|p| p.base_version == meta.base_version) {
            return Err(ServiceError::Conflict(format!(
                "a patch from base version {} already exists for this release",
                meta.base_version
            )));
        }

        let object_key = patch_key(&release.app_id, &release.id, &meta.base_version);
        self.store
            .put(&object_key, patch_bytes, "application/octet-stream")
            .await?;

        let patch_url = self.store.presign(&object_key, PRESIGN_TTL).await?;

        let patch = Patch {
            id: uuid::Uuid::new_v4().to_string(),
            release_id: release_id.to_string(),
            base_version: meta.base_version.clone(),
            patch_url,
            hash: meta.hash.clone(),
            signature: meta.signature.clone(),
            size: meta.size,
            created_at: unix_timestamp(),
        };

        self.db.create_patch(&patch).await?;

        self.audit
            .record(
                &release.app_id,
                "system",
                "release.add_patch",
                &patch.id,
                &format!(
                    "For Version: {}, Base Version: {}",
                    release.version, meta.base_version
                ),
                "",
            )
            .await;

        // The active release now carries a new patch
        self.invalidate_cache(&release.app_id, &release.channel).await;

        Ok(patch)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::objectstore::FsObjectStore;

    fn test_store() -> Arc<dyn ObjectStore> {
        let root = std::env::temp_dir()
            .join("hotpatch-test")
            .join(uuid::Uuid::new_v4().to_string());
        Arc::new(FsObjectStore::new(root, "http://localhost:8080/blobs"))
    }

    async fn test_service(tier: &str) -> (ReleaseService, Database, String) {
        let db = Database::open_in_memory().await.unwrap();
        let app_id = uuid::Uuid::new_v4().to_string();
        db.create_app(&app_id, &format!("app-{app_id}"), "android", &app_id, "o", tier)
            .await
            .unwrap();

        let svc = ReleaseService::new(
            db.clone(),
            test_store(),
            None,
            WebhookDispatcher::new(db.clone()),
            AuditRecorder::new(db.clone()),
        );
        (svc, db, app_id)
    }

    fn publish_req(version: &str) -> PublishRequest {
        PublishRequest {
            version: version.to_string(),
            channel: String::new(),
            platform: "android".to_string(),
            mandatory: false,
            rollout_percentage: 0,
            hash: "deadbeef".to_string(),
            signature: "sig".to_string(),
            is_encrypted: false,
            is_patch: false,
            base_version: None,
            key_id: None,
            size: 6,
        }
    }

    #[tokio::test]
    async fn publish_defaults_channel_and_rollout() {
        let (svc, db, app_id) = test_service("pro").await;

        let release = svc
            .publish(&app_id, &publish_req("1.0.0"), b"bundle".to_vec())
            .await
            .unwrap();

        assert_eq!(release.channel, "production");
        assert_eq!(release.rollout_percentage, 100);
        assert!(release.is_active);
        assert!(release.bundle_url.contains("bundles/"));
        assert_eq!(db.count_active_releases(&app_id, "production").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn publish_rejects_duplicate_version() {
        let (svc, _db, app_id) = test_service("pro").await;
        svc.publish(&app_id, &publish_req("1.0.0"), b"b".to_vec())
            .await
            .unwrap();

        // Same version must conflict even though it would fail monotonicity too
        let err = svc
            .publish(&app_id, &publish_req("1.0.0"), b"b".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn publish_enforces_monotonic_versions() {
        let (svc, _db, app_id) = test_service("pro").await;
        svc.publish(&app_id, &publish_req("1.0.0"), b"b".to_vec())
            .await
            .unwrap();

        let err = svc
            .publish(&app_id, &publish_req("0.9.9"), b"b".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // Equal-but-for-suffix versions are not strictly greater either
        let err = svc
            .publish(&app_id, &publish_req("1.0.0-hotfix"), b"b".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn publish_allows_any_version_when_channel_empty() {
        let (svc, _db, app_id) = test_service("pro").await;
        // No active release yet: even 0.0.1 is accepted
        svc.publish(&app_id, &publish_req("0.0.1"), b"b".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn free_tier_cannot_phase_rollout() {
        let (svc, _db, app_id) = test_service("free").await;

        let mut req = publish_req("1.0.0");
        req.rollout_percentage = 50;
        let err = svc.publish(&app_id, &req, b"b".to_vec()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // Full rollout is fine on the free tier
        svc.publish(&app_id, &publish_req("1.0.0"), b"b".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn publish_requires_base_version_for_patch_releases() {
        let (svc, _db, app_id) = test_service("pro").await;
        let mut req = publish_req("1.0.0");
        req.is_patch = true;
        let err = svc.publish(&app_id, &req, b"b".to_vec()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn rollback_restores_archived_release() {
        let (svc, db, app_id) = test_service("pro").await;
        let r1 = svc
            .publish(&app_id, &publish_req("1.0.0"), b"b".to_vec())
            .await
            .unwrap();
        svc.publish(&app_id, &publish_req("2.0.0"), b"b".to_vec())
            .await
            .unwrap();

        let rolled = svc.rollback(&r1.id).await.unwrap();
        assert!(rolled.is_active);
        assert_eq!(db.count_active_releases(&app_id, "production").await.unwrap(), 1);

        let active = db.get_active_release(&app_id, "production").await.unwrap().unwrap();
        assert_eq!(active.release.id, r1.id);

        // An archived release is still a valid rollback target
        svc.archive(&r1.id).await.unwrap();
        assert_eq!(db.count_active_releases(&app_id, "production").await.unwrap(), 0);
        let rolled = svc.rollback(&r1.id).await.unwrap();
        assert!(rolled.is_active);
    }

    #[tokio::test]
    async fn update_rollout_persists_and_gates_tier() {
        let (svc, db, app_id) = test_service("pro").await;
        let release = svc
            .publish(&app_id, &publish_req("1.0.0"), b"b".to_vec())
            .await
            .unwrap();

        svc.update_rollout(&release.id, 25).await.unwrap();
        assert_eq!(db.get_release(&release.id).await.unwrap().rollout_percentage, 25);

        let err = svc.update_rollout(&release.id, 0).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = svc.update_rollout(&release.id, 101).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        // Free tier: same release, now owned by a downgraded app
        db.set_app_tier(&app_id, "free").await.unwrap();
        let err = svc.update_rollout(&release.id, 10).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn attach_patch_uploads_and_records() {
        let (svc, db, app_id) = test_service("pro").await;
        let release = svc
            .publish(&app_id, &publish_req("2.0.0"), b"b".to_vec())
            .await
            .unwrap();

        let patch = svc
            .attach_patch(
                &release.id,
                &PatchMetadata {
                    base_version: "1.0.0".to_string(),
                    hash: "P1".to_string(),
                    signature: "psig".to_string(),
                    size: 5,
                },
                b"patch".to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(patch.base_version, "1.0.0");
        assert!(patch.patch_url.contains(&format!("patches/{app_id}/{}", release.id)));
        assert_eq!(db.list_patches(&release.id).await.unwrap().len(), 1);

        // A second patch from the same base version conflicts
        let err = svc
            .attach_patch(
                &release.id,
                &PatchMetadata {
                    base_version: "1.0.0".to_string(),
                    hash: "P1b".to_string(),
                    signature: "psig2".to_string(),
                    size: 7,
                },
                b"patch2".to_vec(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        // A different base version is fine
        svc.attach_patch(
            &release.id,
            &PatchMetadata {
                base_version: "1.5.0".to_string(),
                hash: "P2".to_string(),
                signature: "psig3".to_string(),
                size: 5,
            },
            b"patch3".to_vec(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn attach_patch_forbidden_on_free_tier() {
        let (svc, _db, app_id) = test_service("free").await;
        let release = svc
            .publish(&app_id, &publish_req("2.0.0"), b"b".to_vec())
            .await
            .unwrap();

        let err = svc
            .attach_patch(
                &release.id,
                &PatchMetadata {
                    base_version: "1.0.0".to_string(),
                    hash: "P1".to_string(),
                    signature: "psig".to_string(),
                    size: 5,
                },
                b"patch".to_vec(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn publish_writes_audit_trail() {
        let (svc, db, app_id) = test_service("pro").await;
        svc.publish(&app_id, &publish_req("1.0.0"), b"b".to_vec())
            .await
            .unwrap();

        let audit = AuditRecorder::new(db);
        let logs = audit.list(&app_id).await;
        assert!(logs.iter().any(|l| l.action == "release.create"));
    }

    #[tokio::test]
    async fn list_paginates_and_filters() {
        let (svc, _db, app_id) = test_service("pro").await;
        for v in ["1.0.0", "1.1.0", "1.2.0"] {
            svc.publish(&app_id, &publish_req(v), b"b".to_vec())
                .await
                .unwrap();
        }

        let page = svc
            .list(
                &app_id,
                &ListReleasesQuery {
                    per_page: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.releases.len(), 2);

        let active_only = svc
            .list(
                &app_id,
                &ListReleasesQuery {
                    is_active: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(active_only.total, 1);
        assert_eq!(active_only.releases[0].version, "1.2.0");

        // Out-of-range per_page falls back to the default
        let page = svc
            .list(
                &app_id,
                &ListReleasesQuery {
                    per_page: Some(1000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.per_page, 20);
    }
}
