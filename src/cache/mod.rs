use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// A cached value together with its age. The caller decides the freshness
/// policy: reference data is taken at any age, listing pages only within
/// [`LISTING_FRESHNESS`].
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub age: Duration,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    json: String,
    stored_at: DateTime<Utc>,
}

/// Freshness window applied to cached listing pages
pub fn listing_freshness() -> Duration {
    Duration::minutes(5)
}

/// Process-wide keyed cache of fetched values.
///
/// Values are stored as JSON so one cache can hold listing pages, address
/// tiers and reference lists side by side. Entries are evicted only by
/// explicit invalidation or key-collision overwrite; staleness is the
/// caller's call via the returned age.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value and its age, or `None` on a miss.
    /// Entries that no longer deserialize are dropped and reported as misses.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<Cached<T>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        match serde_json::from_str(&entry.json) {
            Ok(value) => Some(Cached {
                value,
                age: Utc::now() - entry.stored_at,
            }),
            Err(e) => {
                warn!("dropping unreadable cache entry {key}: {e}");
                entries.remove(key);
                None
            }
        }
    }

    /// Stores `value` under `key`, unconditionally overwriting and restamping
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_stamped(key, value, Utc::now());
    }

    /// Stores `value` with an explicit timestamp. Used when re-priming an
    /// entry that was fetched earlier, so its age reflects the original fetch
    /// rather than the re-prime.
    pub fn set_stamped<T: Serialize>(&self, key: &str, value: &T, stored_at: DateTime<Utc>) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize cache entry {key}: {e}");
                return;
            }
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), StoredEntry { json, stored_at });
    }

    /// Convenience for callers with a freshness window: a hit older than
    /// `window` counts as a miss (the stale entry is kept; `set` overwrites it)
    pub fn fresh<T: DeserializeOwned>(&self, key: &str, window: Duration) -> Option<T> {
        match self.get::<T>(key) {
            Some(cached) if cached.age <= window => Some(cached.value),
            Some(cached) => {
                debug!("cache entry {key} is stale ({}s old)", cached.age.num_seconds());
                None
            }
            None => None,
        }
    }

    /// Whether an entry exists under `key`, at any age
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn invalidate_all(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Rewinds an entry's timestamp, making it look `secs` older than it is
    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &str, secs: i64) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(key) {
            entry.stored_at = entry.stored_at - Duration::seconds(secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get_returns_value_with_zero_age() {
        let cache = ResultCache::new();
        cache.set("k", &vec!["a".to_string(), "b".to_string()]);

        let hit = cache.get::<Vec<String>>("k").expect("hit");
        assert_eq!(hit.value, vec!["a".to_string(), "b".to_string()]);
        assert!(hit.age.num_seconds() < 2);
    }

    #[test]
    fn test_never_set_key_is_a_miss() {
        let cache = ResultCache::new();
        assert!(cache.get::<Vec<String>>("nope").is_none());
    }

    #[test]
    fn test_set_overwrites_and_restamps() {
        let cache = ResultCache::new();
        cache.set("k", &1u32);
        cache.backdate("k", 600);
        cache.set("k", &2u32);

        let hit = cache.get::<u32>("k").expect("hit");
        assert_eq!(hit.value, 2);
        assert!(hit.age.num_seconds() < 2);
    }

    #[test]
    fn test_set_stamped_keeps_the_given_age() {
        let cache = ResultCache::new();
        cache.set_stamped("k", &7u32, Utc::now() - Duration::minutes(10));

        let hit = cache.get::<u32>("k").expect("hit");
        assert!(hit.age >= Duration::minutes(10));
        // the freshness window measures from the original stamp
        assert_eq!(cache.fresh::<u32>("k", Duration::minutes(5)), None);
    }

    #[test]
    fn test_fresh_respects_window() {
        let cache = ResultCache::new();
        cache.set("k", &7u32);
        assert_eq!(cache.fresh::<u32>("k", Duration::minutes(5)), Some(7));

        cache.backdate("k", 6 * 60);
        assert_eq!(cache.fresh::<u32>("k", Duration::minutes(5)), None);
        // the stale entry is still readable through plain get
        assert!(cache.get::<u32>("k").is_some());
    }

    #[test]
    fn test_invalidate_and_invalidate_all() {
        let cache = ResultCache::new();
        cache.set("a", &1u32);
        cache.set("b", &2u32);

        cache.invalidate("a");
        assert!(cache.get::<u32>("a").is_none());
        assert!(cache.get::<u32>("b").is_some());

        cache.invalidate_all();
        assert!(cache.get::<u32>("b").is_none());
    }

    #[test]
    fn test_unreadable_entry_counts_as_miss() {
        let cache = ResultCache::new();
        cache.set("k", &"text");
        // ask for an incompatible shape
        assert!(cache.get::<Vec<u32>>("k").is_none());
        // and the bad entry was dropped
        assert!(cache.get::<String>("k").is_none());
    }
}
