use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Durable string key-value storage, the browser-local-storage analogue.
///
/// Injected so the engine never touches a concrete backend directly: tests use
/// [`MemoryStore`], the binary uses [`JsonFileStore`]. Writes are best effort
/// and must never fail the caller.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Deserialize a stored JSON value, treating unreadable payloads as a miss
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("discarding unreadable store entry {key}: {e}");
            store.remove(key);
            None
        }
    }
}

/// Serialize a value as JSON under `key`; skipped with a warning if the value
/// cannot be serialized
pub fn set_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => store.set(key, &raw),
        Err(e) => warn!("failed to serialize store entry {key}: {e}"),
    }
}

/// In-memory store used in tests and short-lived sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// File-backed store persisting the whole map as one pretty-printed JSON
/// document, rewritten on every mutation
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty when the file is missing or
    /// unreadable
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("store file {} is not valid JSON, starting empty: {e}", path.display());
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        match serde_json::to_string_pretty(entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!("failed to write store file {}: {e}", self.path.display());
                }
            }
            Err(e) => warn!("failed to serialize store file: {e}"),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing"), None);

        store.set("k", "v1");
        assert_eq!(store.get("k").as_deref(), Some("v1"));

        store.set("k", "v2");
        assert_eq!(store.get("k").as_deref(), Some("v2"));

        store.remove("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        set_json(&store, "nums", &vec![1, 2, 3]);
        let back: Option<Vec<i32>> = get_json(&store, "nums");
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_json_helper_discards_corrupt_entry() {
        let store = MemoryStore::new();
        store.set("nums", "not json");
        let back: Option<Vec<i32>> = get_json(&store, "nums");
        assert_eq!(back, None);
        // the corrupt entry is gone after the failed read
        assert_eq!(store.get("nums"), None);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(&path);
        store.set("filters:all", r#"{"freeTextQuery":"an"}"#);
        drop(store);

        let reopened = JsonFileStore::open(&path);
        assert_eq!(
            reopened.get("filters:all").as_deref(),
            Some(r#"{"freeTextQuery":"an"}"#)
        );

        reopened.remove("filters:all");
        drop(reopened);

        let again = JsonFileStore::open(&path);
        assert_eq!(again.get("filters:all"), None);
    }

    #[test]
    fn test_file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{{{").unwrap();

        let store = JsonFileStore::open(&path);
        assert_eq!(store.get("anything"), None);
        store.set("k", "v");
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }
}
