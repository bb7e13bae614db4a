//! Persistent key/value tier.
//!
//! Mirrors browser storage semantics: synchronous string get/set/remove
//! and key enumeration, with writes that may fail once a capacity ceiling
//! is reached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The write would exceed the store's byte quota
    #[error("storage quota exceeded ({needed} bytes needed, quota {quota})")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Storage is turned off
    #[error("persistent storage is disabled")]
    Disabled,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A previous holder of the store lock panicked
    #[error("store lock poisoned")]
    Poisoned,
}

/// String-keyed persistent storage.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

impl<T: PersistentStore + ?Sized> PersistentStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys()
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// HashMap-backed store with an optional byte quota over keys and values.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.iter().map(|(k, v)| k.len() + v.len()).sum())
            .unwrap_or(0)
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.clear();
        Ok(())
    }
}

/// Storage that is switched off: reads find nothing, writes fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

impl PersistentStore for DisabledStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Disabled)
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }

    fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
