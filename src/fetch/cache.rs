// src/fetch/cache.rs
//! Time-bounded response cache keyed by normalized request key.
//!
//! Entries are only checked for freshness on read; stale entries stay in the
//! map until overwritten or until `clear()` runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use super::Payload;

pub const DEFAULT_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Payload,
    stored_at: Instant,
    ttl: Duration,
}

#[derive(Debug)]
pub struct ResourceCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }
}

impl ResourceCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh payload for `key`, or `None` when absent or older than its TTL.
    pub fn get(&self, key: &str) -> Option<Payload> {
        let map = self.entries.lock().expect("cache mutex poisoned");
        let entry = map.get(key)?;
        if entry.stored_at.elapsed() < entry.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Unconditionally overwrite `key`, stamping the current instant.
    pub fn set(&self, key: &str, payload: Payload) {
        self.set_with_ttl(key, payload, self.ttl);
    }

    /// Like `set`, but the entry lives for `ttl` instead of the cache default.
    pub fn set_with_ttl(&self, key: &str, payload: Payload, ttl: Duration) {
        let mut map = self.entries.lock().expect("cache mutex poisoned");
        map.insert(
            key.to_string(),
            CacheEntry {
                payload,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Drop every entry in one step.
    pub fn clear(&self) {
        self.entries.lock().expect("cache mutex poisoned").clear();
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn get_after_set_then_expire() {
        let cache = ResourceCache::default();
        cache.set("k", Payload::Json(json!({"v": 1})));
        assert_eq!(cache.get("k"), Some(Payload::Json(json!({"v": 1}))));

        tokio::time::advance(Duration::from_secs(119)).await;
        assert!(cache.get("k").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").is_none());
        // stale entries are not purged on read
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_restamps() {
        let cache = ResourceCache::with_ttl(Duration::from_secs(10));
        cache.set("k", Payload::Text("old".into()));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", Payload::Text("new".into()));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k"), Some(Payload::Text("new".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn per_entry_ttl_outlives_the_default() {
        let cache = ResourceCache::with_ttl(Duration::from_secs(10));
        cache.set("short", Payload::Text("s".into()));
        cache.set_with_ttl("long", Payload::Text("l".into()), Duration::from_secs(600));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get("short").is_none());
        assert_eq!(cache.get("long"), Some(Payload::Text("l".into())));
    }

    #[test]
    fn clear_removes_everything() {
        let cache = ResourceCache::default();
        cache.set("a", Payload::Text("1".into()));
        cache.set("b", Payload::Text("2".into()));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }
}
