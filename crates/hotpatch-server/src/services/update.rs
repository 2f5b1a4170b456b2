//! The hot-path update check engine.
//!
//! This is the most critical code in the system: it runs on every app launch
//! of every device. The active release is looked up through the cache when
//! one is configured (5-minute TTL, invalidated on every release mutation),
//! versions are compared under lenient semantic ordering, and phased rollout
//! is gated by a stable per-device cohort bucket.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::cache::{active_release_key, CacheLayer, ACTIVE_RELEASE_TTL};
use crate::storage::models::ReleaseWithPatches;
use crate::storage::Database;

use super::ServiceError;

/// Parameters of an update check, from query params or a JSON body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCheckRequest {
    #[serde(rename = "appId", default)]
    pub app_id: String,
    #[serde(rename = "deviceId", default)]
    pub device_id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub channel: String,
}

/// The update decision returned to the SDK.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCheckResponse {
    #[serde(rename = "updateAvailable")]
    pub update_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "bundleUrl", skip_serializing_if = "Option::is_none")]
    pub bundle_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mandatory: Option<bool>,
    #[serde(rename = "isEncrypted", skip_serializing_if = "Option::is_none")]
    pub is_encrypted: Option<bool>,
    #[serde(rename = "isPatch", skip_serializing_if = "Option::is_none")]
    pub is_patch: Option<bool>,
    #[serde(rename = "baseVersion", skip_serializing_if = "Option::is_none")]
    pub base_version: Option<String>,
}

impl UpdateCheckResponse {
    fn not_available() -> Self {
        Self::default()
    }
}

#[derive(Clone)]
pub struct UpdateService {
    db: Database,
    cache: Option<Arc<dyn CacheLayer>>,
}

impl UpdateService {
    pub fn new(db: Database, cache: Option<Arc<dyn CacheLayer>>) -> Self {
        Self { db, cache }
    }

    /// Decide whether the calling device should install something new.
    ///
    /// Database errors surface as `Internal`; a missing active release and
    /// rollout exclusion are successes with `updateAvailable: false`; cache
    /// failures silently fall through to the database.
    #[instrument(skip(self, req), fields(app_id = %req.app_id, channel = %req.channel))]
    pub async fn check(
        &self,
        req: &UpdateCheckRequest,
    ) -> Result<UpdateCheckResponse, ServiceError> {
        let Some(active) = self.lookup_active_release(&req.app_id, &req.channel).await? else {
            return Ok(UpdateCheckResponse::not_available());
        };
        let release = &active.release;

        // Already up to date (or ahead): equal versions are not updates.
        if !is_version_greater(&release.version, &req.version) {
            return Ok(UpdateCheckResponse::not_available());
        }

        if release.rollout_percentage < 100
            && !is_in_rollout(&req.device_id, release.rollout_percentage)
        {
            debug!(device_id = %req.device_id, "Device outside rollout cohort");
            return Ok(UpdateCheckResponse::not_available());
        }

        // Prefer a patch whose base version matches the device exactly.
        let mut bundle_url = release.bundle_url.clone();
        let mut hash = release.hash.clone();
        let mut signature = release.signature.clone();
        let mut is_patch = release.is_patch;
        let mut base_version = release.base_version.clone();

        if let Some(patch) = active
            .patches
            .iter()
            .find(|p| p.base_version == req.version)
        {
            bundle_url = patch.patch_url.clone();
            hash = patch.hash.clone();
            signature = patch.signature.clone();
            is_patch = true;
            base_version = Some(patch.base_version.clone());
        }

        Ok(UpdateCheckResponse {
            update_available: true,
            id: Some(release.id.clone()),
            bundle_url: Some(bundle_url),
            hash: Some(hash),
            signature: Some(signature),
            version: Some(release.version.clone()),
            mandatory: Some(release.mandatory),
            // Encryption applies to the whole release, patches included
            is_encrypted: Some(release.is_encrypted),
            is_patch: Some(is_patch),
            base_version,
        })
    }

    /// Cache-first active release lookup with fall-through to the database.
    async fn lookup_active_release(
        &self,
        app_id: &str,
        channel: &str,
    ) -> Result<Option<ReleaseWithPatches>, ServiceError> {
        let cache_key = active_release_key(app_id, channel);

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&cache_key).await {
                if let Ok(release) = serde_json::from_slice::<ReleaseWithPatches>(&cached) {
                    return Ok(Some(release));
                }
                // Unreadable payload: drop it and fall through
                cache.del(&cache_key).await;
            }
        }

        let Some(active) = self.db.get_active_release(app_id, channel).await? else {
            return Ok(None);
        };

        if let Some(cache) = &self.cache {
            if let Ok(data) = serde_json::to_vec(&active) {
                cache.set(&cache_key, data, ACTIVE_RELEASE_TTL).await;
            }
        }

        Ok(Some(active))
    }
}

/// FNV-1a 32-bit hash of a device id, reduced to a bucket in [0, 100).
fn cohort_bucket(device_id: &str) -> u32 {
    const FNV_OFFSET: u32 = 2_166_136_261;
    const FNV_PRIME: u32 = 16_777_619;

    let mut hash = FNV_OFFSET;
    for byte in device_id.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash % 100
}

/// Stable cohort gate: a device is in the rollout iff its bucket falls below
/// the rollout percentage.
pub fn is_in_rollout(device_id: &str, rollout_pct: i64) -> bool {
    i64::from(cohort_bucket(device_id)) < rollout_pct
}

/// Returns true if `v1 > v2` under lenient semantic ordering.
pub fn is_version_greater(v1: &str, v2: &str) -> bool {
    let p1 = parse_version(v1);
    let p2 = parse_version(v2);

    let len = p1.len().max(p2.len());
    for i in 0..len {
        let a = p1.get(i).copied().unwrap_or(0);
        let b = p2.get(i).copied().unwrap_or(0);
        if a > b {
            return true;
        }
        if a < b {
            return false;
        }
    }
    false
}

/// Split a version like "1.2.3" into [1, 2, 3]. Tolerates a leading "v"
/// prefix and non-numeric suffixes ("1.2.3-beta" parses as [1, 2, 3]).
fn parse_version(v: &str) -> Vec<u64> {
    let v = v.strip_prefix(['v', 'V']).unwrap_or(v);

    v.split('.')
        .map(|part| {
            let digits: &str = match part.find(|c: char| !c.is_ascii_digit()) {
                Some(idx) => &part[..idx],
                None => part,
            };
            digits.parse().unwrap_or(0)
        })
        .collect()
}
