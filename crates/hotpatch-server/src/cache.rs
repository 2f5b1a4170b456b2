//! Optional key-value cache with TTL.
//!
//! The cache is a performance accelerator, never a source of truth: every
//! caller holds an `Option<Arc<dyn CacheLayer>>` and falls through to the
//! database when the cache is absent or errors. Implementations therefore
//! swallow their own failures and report them as misses.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Capability interface over a shared or in-process key-value store.
///
/// All methods are infallible from the caller's perspective: a backend error
/// behaves like a miss (`get` returns `None`, `set`/`del` are no-ops,
/// `incr_with_expire` returns `None` so rate limiting fails open).
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);

    async fn del(&self, key: &str);

    /// Atomically increment a counter, setting its expiry to `window` on
    /// first touch. Returns the post-increment value.
    async fn incr_with_expire(&self, key: &str, window: Duration) -> Option<u64>;
}

/// Cache key for the active release of an (app, channel).
pub fn active_release_key(app_id: &str, channel: &str) -> String {
    format!("release:active:{app_id}:{channel}")
}

/// TTL for cached active releases.
pub const ACTIVE_RELEASE_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

struct Counter {
    count: u64,
    expires_at: Instant,
}

/// In-process `CacheLayer` backed by a mutex-protected map.
///
/// Counters and values live in separate maps so a `set` cannot clobber a
/// rate-limit window.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    counters: Mutex<HashMap<String, Counter>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                Entry {
                    value,
                    expires_at: Instant::now() + ttl,
                },
            );
        }
    }

    async fn del(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    async fn incr_with_expire(&self, key: &str, window: Duration) -> Option<u64> {
        let mut counters = self.counters.lock().ok()?;
        let now = Instant::now();

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now + window,
        });
        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = now + window;
        }
        counter.count += 1;
        Some(counter.count)
    }
}
