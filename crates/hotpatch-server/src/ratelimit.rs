//! Per-client sliding-window rate limiting.
//!
//! When a shared [`CacheLayer`] is available the counters live there, so the
//! limit holds across API instances; otherwise each instance keeps its own
//! mutex-protected map with a background sweep evicting expired buckets.
//! Shared-store failures fail open.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::CacheLayer;

struct Visitor {
    count: u64,
    reset_at: Instant,
}

/// Request-admission limiter for a single protected route group.
pub struct RateLimiter {
    limit: u64,
    window: Duration,
    cache: Option<Arc<dyn CacheLayer>>,
    visitors: Mutex<HashMap<String, Visitor>>,
}

impl RateLimiter {
    pub fn new(limit: u64, window: Duration, cache: Option<Arc<dyn CacheLayer>>) -> Self {
        Self {
            limit,
            window,
            cache,
            visitors: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a request from `key` (typically the client IP) is admitted.
    pub async fn allow(&self, key: &str) -> bool {
        if let Some(cache) = &self.cache {
            let redis_key = format!("rl:{key}");
            return match cache.incr_with_expire(&redis_key, self.window).await {
                Some(n) => n <= self.limit,
                // Fail open on shared-store errors
                None => true,
            };
        }

        let Ok(mut visitors) = self.visitors.lock() else {
            return true;
        };
        let now = Instant::now();

        match visitors.get_mut(key) {
            Some(v) if now < v.reset_at => {
                if v.count >= self.limit {
                    return false;
                }
                v.count += 1;
                true
            }
            _ => {
                visitors.insert(
                    key.to_string(),
                    Visitor {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }

    fn sweep(&self) {
        let Ok(mut visitors) = self.visitors.lock() else {
            return;
        };
        let now = Instant::now();
        let before = visitors.len();
        visitors.retain(|_, v| now < v.reset_at);
        let evicted = before - visitors.len();
        if evicted > 0 {
            debug!(evicted, "Rate limiter evicted expired buckets");
        }
    }

    /// Spawn the eviction sweep for the in-process map. No-op when counters
    /// live in a shared cache (the store expires them itself).
    pub fn spawn_sweeper(self: &Arc<Self>) {
        if self.cache.is_some() {
            return;
        }
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.tick().await;
            loop {
                interval.tick().await;
                limiter.sweep();
            }
        });
    }
}
