//! Persistent key-value store abstraction.
//!
//! The chat services only need string keys and string values with a finite
//! capacity. A store may refuse a write with [`StoreError::QuotaExceeded`];
//! callers are expected to recover (see `recovery.rs`).

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{Result, StoreError};

/// Synchronous string key-value store shared by every conversation.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace a value. Fails with `QuotaExceeded` when the store
    /// cannot hold it.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    fn keys(&self) -> Result<Vec<String>>;

    /// Bytes currently in use (keys plus values).
    fn usage_bytes(&self) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store with an optional byte capacity.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    /// An unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once `capacity` bytes are in use.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            capacity: Some(capacity),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock();

        if let Some(capacity) = self.capacity {
            let used: usize = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
            let replaced = entries.get(key).map(|v| entry_size(key, v)).unwrap_or(0);
            let needed = used - replaced + entry_size(key, value);
            if needed > capacity {
                return Err(StoreError::QuotaExceeded { needed, capacity });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn usage_bytes(&self) -> Result<usize> {
        Ok(self.lock().iter().map(|(k, v)| entry_size(k, v)).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.remove("a").unwrap();
    }

    #[test]
    fn rejects_write_over_capacity() {
        let store = MemoryStore::with_capacity(10);
        store.set("k", "12345").unwrap();
        let err = store.set("j", "123456").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.usage_bytes().unwrap(), 6);
    }

    #[test]
    fn replacing_a_value_frees_its_old_size() {
        let store = MemoryStore::with_capacity(10);
        store.set("k", "123456789").unwrap();
        store.set("k", "987654321").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("987654321"));
    }
}
