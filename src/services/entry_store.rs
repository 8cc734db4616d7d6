//! Key to deferred-value map backing the cache.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::models::{DeferredValue, Resolution, Snapshot};
use crate::services::mirror_state::MirrorState;

/// Single source of truth for which keys are cached.
///
/// Each present key maps to exactly one [`DeferredValue`]; `set` on an
/// existing key replaces it (last writer wins).
pub struct EntryStore<T> {
    entries: HashMap<String, DeferredValue<T>>,
}

impl<T> Default for EntryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EntryStore<T> {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The cached handle for `key`, if any. No side effects.
    pub fn get(&self, key: &str) -> Option<DeferredValue<T>> {
        self.entries.get(key).cloned()
    }

    /// Insert or overwrite `key`.
    ///
    /// When mirroring is disabled the store is cleared first, so the entry is
    /// always recorded but everything else is evicted.
    ///
    /// # Returns
    /// Number of entries evicted by the disabled-mode reset.
    pub fn set(&mut self, key: String, value: DeferredValue<T>, mirror: &MirrorState) -> usize {
        let evicted = if mirror.is_enabled() {
            0
        } else {
            self.clear()
        };
        self.entries.insert(key, value);
        evicted
    }

    /// Remove `key`.
    ///
    /// # Returns
    /// * `Ok(value)` with the removed handle
    /// * `Err(CacheError::KeyNotFound)` if nothing was cached under `key`
    pub fn delete(&mut self, key: &str) -> CacheResult<DeferredValue<T>> {
        self.entries
            .remove(key)
            .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))
    }

    /// Remove every entry, returning how many were present.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Number of entries, pending ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is cached.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Cached keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl<T: Serialize + Clone> EntryStore<T> {
    /// Resolved payload of every present key.
    ///
    /// Pending entries are omitted. An entry whose payload fails to
    /// serialize is skipped with a warning.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (key, value) in &self.entries {
            let Resolution::Resolved(payload) = value.resolution() else {
                continue;
            };
            match serde_json::to_value(&payload) {
                Ok(json) => {
                    snapshot.insert(key.clone(), json);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "Skipping cache entry that cannot be serialized");
                }
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enabled() -> MirrorState {
        MirrorState::new(true)
    }

    #[test]
    fn test_get_returns_same_instance() {
        let mut store = EntryStore::new();
        let value = DeferredValue::resolved(1u32);
        store.set("k".to_string(), value.clone(), &enabled());

        let cached = store.get("k").unwrap();
        assert!(cached.ptr_eq(&value));
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_set_overwrites_existing_key() {
        let mut store = EntryStore::new();
        let first = DeferredValue::resolved(1u32);
        let second = DeferredValue::resolved(2u32);
        store.set("k".to_string(), first.clone(), &enabled());
        store.set("k".to_string(), second.clone(), &enabled());

        assert_eq!(store.len(), 1);
        assert!(store.get("k").unwrap().ptr_eq(&second));
    }

    #[test]
    fn test_set_while_disabled_resets_store() {
        let mut store = EntryStore::new();
        let state = enabled();
        store.set("a".to_string(), DeferredValue::resolved(1u32), &state);
        store.set("b".to_string(), DeferredValue::resolved(2u32), &state);

        state.disable();
        let evicted = store.set("c".to_string(), DeferredValue::resolved(3u32), &state);

        assert_eq!(evicted, 2);
        assert_eq!(store.keys(), vec!["c".to_string()]);
    }

    #[test]
    fn test_delete_missing_key_reports_not_found() {
        let mut store = EntryStore::<u32>::new();
        let err = store.delete("nope").unwrap_err();
        assert_eq!(err, CacheError::KeyNotFound("nope".to_string()));
    }

    #[test]
    fn test_delete_removes_entry() {
        let mut store = EntryStore::new();
        store.set("k".to_string(), DeferredValue::resolved(1u32), &enabled());
        assert!(store.delete("k").is_ok());
        assert!(!store.contains_key("k"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut store = EntryStore::new();
        store.set("k".to_string(), DeferredValue::resolved(1u32), &enabled());

        assert_eq!(store.clear(), 1);
        assert_eq!(store.clear(), 0);
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_snapshot_skips_pending_entries() {
        let mut store = EntryStore::new();
        let (_resolver, pending) = DeferredValue::pending();
        store.set("done".to_string(), DeferredValue::resolved("x".to_string()), &enabled());
        store.set("waiting".to_string(), pending, &enabled());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("done"), Some(&json!("x")));
    }

    #[test]
    fn test_snapshot_skips_unserializable_payloads() {
        use std::collections::HashMap;

        // Non-string map keys cannot be encoded as a JSON object.
        let mut bad = HashMap::new();
        bad.insert((1u8, 2u8), 3u8);

        let mut store = EntryStore::new();
        store.set("bad".to_string(), DeferredValue::resolved(bad), &enabled());
        store.set("good".to_string(), DeferredValue::resolved(HashMap::new()), &enabled());

        let snapshot = store.snapshot();
        assert!(snapshot.contains_key("good"));
        assert!(!snapshot.contains_key("bad"));
    }
}
