//! Last-known-good response cache.
//!
//! # Responsibilities
//! - Remember the most recent successful body per fallback key
//! - Serve it when a live request cannot succeed
//!
//! # Design Decisions
//! - Owned by whoever builds the ApiClient and shared via Arc, never global
//! - Last write wins
//! - Entries never expire unless a max age is configured

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct FallbackEntry {
    value: Value,
    stored_at: Instant,
}

/// A thread-safe key → JSON value store.
#[derive(Debug, Clone, Default)]
pub struct FallbackStore {
    inner: Arc<DashMap<String, FallbackEntry>>,
    max_age: Option<Duration>,
}

impl FallbackStore {
    /// Create an empty store whose entries never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that ignores entries older than `max_age`.
    pub fn with_max_age(max_age: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_age,
        }
    }

    pub fn set_fallback_data(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        tracing::trace!(key = %key, "Fallback data stored");
        self.inner.insert(
            key,
            FallbackEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn get_fallback_data(&self, key: &str) -> Option<Value> {
        let entry = self.inner.get(key)?;
        if self.is_stale(&entry) {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn has_fallback_data(&self, key: &str) -> bool {
        self.inner.get(key).is_some_and(|e| !self.is_stale(&e))
    }

    /// Typed read. `None` when missing, stale, or of a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_fallback_data(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Fallback data has unexpected shape");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.remove(key).map(|(_, e)| e.value)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn is_stale(&self, entry: &FallbackEntry) -> bool {
        self.max_age
            .is_some_and(|max| entry.stored_at.elapsed() > max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_before_and_after_set() {
        let store = FallbackStore::new();
        assert!(store.get_fallback_data("k").is_none());
        assert!(!store.has_fallback_data("k"));

        store.set_fallback_data("k", json!({"posts": [1]}));
        store.set_fallback_data("k", json!({"posts": [1, 2]}));
        assert_eq!(store.get_fallback_data("k"), Some(json!({"posts": [1, 2]})));
        assert!(store.has_fallback_data("k"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let store = FallbackStore::new();
        let other = store.clone();
        store.set_fallback_data("feed", json!([1, 2, 3]));
        assert_eq!(other.get_as::<Vec<u32>>("feed"), Some(vec![1, 2, 3]));
        assert_eq!(other.get_as::<String>("feed"), None);

        other.remove("feed");
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_age() {
        let store = FallbackStore::with_max_age(Some(Duration::from_secs(30)));
        store.set_fallback_data("k", json!(1));
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(store.has_fallback_data("k"));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!store.has_fallback_data("k"));
        assert!(store.get_fallback_data("k").is_none());
    }
}
