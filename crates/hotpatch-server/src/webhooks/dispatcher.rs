//! Webhook delivery with HMAC signing, retry, and backoff.
//!
//! Delivery is at-least-once: every matching subscription gets its own
//! spawned task, attempts are signed with a fresh timestamp, and ordering
//! across events is not guaranteed. Consumers deduplicate on the event id.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};

use hotpatch_core::db::unix_timestamp;

use crate::storage::Database;

type HmacSha256 = Hmac<Sha256>;

/// The JSON body delivered to each subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Exponential backoff policy for failed deliveries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per subscription, including the first.
    pub max_attempts: u32,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `n` (1-indexed after the first attempt):
    /// 2^(n-1) seconds plus uniform jitter in [0, base/2).
    pub fn delay_for_retry(&self, n: u32) -> Duration {
        let base_ms = 1000u64 << (n.saturating_sub(1).min(16));
        let jitter_ms = rand::thread_rng().gen_range(0..base_ms / 2);
        Duration::from_millis(base_ms + jitter_ms)
    }
}

/// Compute the delivery signature: hex(HMAC-SHA256(secret, timestamp + "." + body)).
pub fn sign_payload(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Dispatches signed webhook notifications for an app's subscriptions.
#[derive(Clone)]
pub struct WebhookDispatcher {
    db: Database,
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl WebhookDispatcher {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            http: reqwest::Client::new(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(db: Database, policy: RetryPolicy) -> Self {
        Self {
            db,
            http: reqwest::Client::new(),
            policy,
        }
    }

    /// Fan an event out to every active subscription whose event set contains
    /// `event_type`. Returns immediately; all lookups and deliveries happen
    /// in spawned tasks and are invisible to the caller.
    pub fn dispatch(&self, app_id: &str, event_type: &str, payload: serde_json::Value) {
        let dispatcher = self.clone();
        let app_id = app_id.to_string();
        let event_type = event_type.to_string();

        tokio::spawn(async move {
            let subscriptions = match dispatcher.db.list_active_webhooks(&app_id).await {
                Ok(subs) => subs,
                Err(e) => {
                    warn!(error = %e, app_id = %app_id, "Webhook subscription lookup failed");
                    return;
                }
            };

            let event = WebhookEvent {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                event: event_type.clone(),
                payload,
            };
            let body = match serde_json::to_vec(&event) {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "Webhook payload serialization failed");
                    return;
                }
            };

            for sub in subscriptions {
                if !sub.subscribes_to(&event_type) {
                    continue;
                }
                let dispatcher = dispatcher.clone();
                let body = body.clone();
                let event_id = event.id.clone();
                tokio::spawn(async move {
                    dispatcher.deliver(&sub.url, &sub.secret, &event_id, &body).await;
                });
            }
        });
    }

    /// Deliver one payload to one subscription, retrying with backoff.
    async fn deliver(&self, url: &str, secret: &str, event_id: &str, body: &[u8]) {
        for attempt in 1..=self.policy.max_attempts {
            let timestamp = unix_timestamp().to_string();
            let Some(signature) = sign_payload(secret, &timestamp, body) else {
                warn!(url = %url, "Webhook signing failed, dropping delivery");
                return;
            };

            let result = self
                .http
                .post(url)
                .timeout(self.policy.request_timeout)
                .header("Content-Type", "application/json")
                .header("X-HotPatch-Signature", format!("sha256={signature}"))
                .header("X-HotPatch-Timestamp", &timestamp)
                .header("X-HotPatch-Delivery", uuid::Uuid::new_v4().to_string())
                .header("User-Agent", "HotPatch-Webhook/1.0")
                .body(body.to_vec())
                .send()
                .await;

            match result {
                // 2xx and 3xx count as delivered
                Ok(resp) if resp.status().as_u16() < 400 => {
                    debug!(url = %url, event_id = %event_id, attempt, "Webhook delivered");
                    return;
                }
                Ok(resp) => {
                    warn!(
                        url = %url,
                        status = resp.status().as_u16(),
                        attempt,
                        "Webhook returned error status"
                    );
                }
                Err(e) => {
                    warn!(url = %url, error = %e, attempt, "Webhook request failed");
                }
            }

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.delay_for_retry(attempt)).await;
            }
        }

        warn!(
            url = %url,
            event_id = %event_id,
            attempts = self.policy.max_attempts,
            "Webhook delivery dropped after final attempt"
        );
    }
}
