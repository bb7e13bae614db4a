//! Two-tier cache for query results.
//!
//! Entries live in a process-memory map in front of a [`PersistentStore`].
//! Every entry carries its capture time; freshness is checked against the
//! caller's `max_age` on each read, so the same entry can be fresh for one
//! namespace policy and stale for another.
//!
//! The persistent tier is best effort. Write failures (quota, storage
//! disabled) are logged and swallowed, and anything unreadable in it is a
//! miss. The memory tier only ever holds entries that were written through
//! this store or promoted from the persistent tier.
//!
//! A `clear` the persistent tier refuses leaves a tombstone behind: older
//! persisted entries under the cleared prefix stay invisible to reads until
//! a later `clear` of that prefix goes through.
//!
//! # Example
//!
//! ```rust
//! use gwm_cache::{CacheStore, MemoryStore};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let cache = CacheStore::new(Box::new(MemoryStore::new()));
//! cache.write("var_points_v1:depth:*", json!({"points": []}));
//! let hit = cache.read("var_points_v1:depth:*", Duration::from_secs(60));
//! assert_eq!(hit, Some(json!({"points": []})));
//! ```

pub mod clock;
pub mod sqlite;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sqlite::SqliteStore;
pub use store::{DisabledStore, MemoryStore, PersistentStore, StoreError};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A cached payload and its capture time in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: i64,
    pub payload: Value,
}

impl CacheEntry {
    /// Fresh while `now - timestamp <= max_age`.
    pub fn is_fresh(&self, now: i64, max_age: Duration) -> bool {
        let budget = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(self.timestamp) <= budget
    }

    /// Decode a persisted entry. Anything that is not an object with a
    /// numeric `timestamp` and a `payload` is rejected.
    pub fn decode(raw: &str) -> Option<CacheEntry> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let object = value.as_object()?;
        let timestamp = match object.get("timestamp")? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64)
            })?,
            _ => return None,
        };
        let payload = object.get("payload")?.clone();
        Some(CacheEntry { timestamp, payload })
    }
}

/// Key, capture time and tiers holding an entry, for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub key: String,
    /// `None` when the persisted entry is unreadable
    pub timestamp: Option<i64>,
    pub in_memory: bool,
    pub persisted: bool,
}

/// Memory tier in front of a persistent key/value store.
pub struct CacheStore {
    memory: Mutex<HashMap<String, CacheEntry>>,
    /// Prefixes whose persistent removal failed, with the clear time
    tombstones: Mutex<Vec<(String, i64)>>,
    persistent: Box<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(persistent: Box<dyn PersistentStore>) -> Self {
        Self::with_clock(persistent, Arc::new(SystemClock))
    }

    pub fn with_clock(persistent: Box<dyn PersistentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            tombstones: Mutex::new(Vec::new()),
            persistent,
            clock,
        }
    }

    fn memory(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // The map holds plain data, a panic elsewhere cannot leave it torn
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tombstones(&self) -> MutexGuard<'_, Vec<(String, i64)>> {
        self.tombstones.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A persisted entry written no later than a failed clear of its prefix.
    fn is_buried(&self, key: &str, entry: &CacheEntry) -> bool {
        self.tombstones()
            .iter()
            .any(|(prefix, cleared_at)| key.starts_with(prefix.as_str()) && entry.timestamp <= *cleared_at)
    }

    fn bury(&self, prefix: &str) {
        let now = self.clock.now_millis();
        self.tombstones().push((prefix.to_string(), now));
    }

    fn unbury(&self, prefix: &str) {
        self.tombstones().retain(|(buried, _)| !buried.starts_with(prefix));
    }

    /// Payload stored under `key` if it is at most `max_age` old.
    pub fn read(&self, key: &str, max_age: Duration) -> Option<Value> {
        let now = self.clock.now_millis();
        if let Some(entry) = self.memory().get(key) {
            if entry.is_fresh(now, max_age) {
                debug!("cache: memory hit for {}", key);
                return Some(entry.payload.clone());
            }
        }

        let raw = match self.persistent.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("cache: miss for {}", key);
                return None;
            }
            Err(e) => {
                debug!("cache: persistent read failed for {}: {}", key, e);
                return None;
            }
        };
        let Some(entry) = CacheEntry::decode(&raw) else {
            debug!("cache: ignoring malformed entry for {}", key);
            return None;
        };
        if !entry.is_fresh(now, max_age) {
            debug!("cache: expired entry for {}", key);
            return None;
        }
        if self.is_buried(key, &entry) {
            debug!("cache: {} was cleared but is still persisted", key);
            return None;
        }
        debug!("cache: persistent hit for {}, promoting", key);
        let payload = entry.payload.clone();
        self.memory().insert(key.to_string(), entry);
        Some(payload)
    }

    /// Typed [`read`](Self::read); a payload of the wrong shape is a miss.
    pub fn read_as<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let payload = self.read(key, max_age)?;
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("cache: payload for {} has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Store `payload` under `key` in both tiers, stamped with the current time.
    pub fn write(&self, key: &str, payload: Value) {
        let entry = CacheEntry {
            timestamp: self.clock.now_millis(),
            payload,
        };
        let persisted = serde_json::to_string(&entry);
        self.memory().insert(key.to_string(), entry);
        match persisted {
            Ok(raw) => {
                if let Err(e) = self.persistent.set(key, &raw) {
                    warn!("cache: could not persist {}: {}", key, e);
                }
            }
            Err(e) => warn!("cache: could not serialize {}: {}", key, e),
        }
    }

    /// Typed [`write`](Self::write).
    pub fn write_as<T: Serialize>(&self, key: &str, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.write(key, value),
            Err(e) => warn!("cache: could not serialize {}: {}", key, e),
        }
    }

    /// Remove every entry, or only keys starting with `prefix`, from both tiers.
    ///
    /// When the persistent tier cannot be cleared, the affected entries are
    /// still treated as gone by this store.
    pub fn clear(&self, prefix: Option<&str>) {
        let prefix = prefix.unwrap_or("");
        self.memory().retain(|key, _| !key.starts_with(prefix));
        match self.clear_persistent(prefix) {
            Ok(()) => self.unbury(prefix),
            Err(e) => {
                warn!("cache: could not clear persisted entries under {:?}: {}", prefix, e);
                self.bury(prefix);
            }
        }
    }

    fn clear_persistent(&self, prefix: &str) -> Result<(), StoreError> {
        if prefix.is_empty() {
            return self.persistent.clear();
        }
        let mut failure = None;
        for key in self.persistent.keys()?.iter().filter(|k| k.starts_with(prefix)) {
            if let Err(e) = self.persistent.remove(key) {
                warn!("cache: could not remove {}: {}", key, e);
                failure = Some(e);
            }
        }
        failure.map_or(Ok(()), Err)
    }

    /// Entries known to either tier, sorted by key.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let mut entries: BTreeMap<String, EntryInfo> = BTreeMap::new();
        match self.persistent.keys() {
            Ok(keys) => {
                for key in keys {
                    let timestamp = self
                        .persistent
                        .get(&key)
                        .ok()
                        .flatten()
                        .and_then(|raw| CacheEntry::decode(&raw))
                        .map(|entry| entry.timestamp);
                    entries.insert(
                        key.clone(),
                        EntryInfo {
                            key,
                            timestamp,
                            in_memory: false,
                            persisted: true,
                        },
                    );
                }
            }
            Err(e) => warn!("cache: could not list persistent keys: {}", e),
        }
        for (key, entry) in self.memory().iter() {
            let info = entries.entry(key.clone()).or_insert_with(|| EntryInfo {
                key: key.clone(),
                timestamp: Some(entry.timestamp),
                in_memory: true,
                persisted: false,
            });
            info.in_memory = true;
            info.timestamp = Some(entry.timestamp);
        }
        entries.into_values().collect()
    }

    /// Current time according to the store's clock.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOUR: Duration = Duration::from_secs(3600);

    fn manual_cache(persistent: Box<dyn PersistentStore>) -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = CacheStore::with_clock(persistent, clock.clone());
        (cache, clock)
    }

    #[test]
    fn write_then_read_round_trips() {
        let cache = CacheStore::new(Box::new(MemoryStore::new()));
        let payload = json!({"points": [{"code": "A", "lat": 45.1}], "stats": {"A": {"count": 2}}});
        cache.write("k", payload.clone());
        assert_eq!(cache.read("k", Duration::MAX), Some(payload));
    }

    #[test]
    fn zero_max_age_passes_only_at_the_same_instant() {
        let (cache, clock) = manual_cache(Box::new(MemoryStore::new()));
        cache.write("k", json!(1));
        assert_eq!(cache.read("k", Duration::ZERO), Some(json!(1)));
        clock.advance(1);
        assert_eq!(cache.read("k", Duration::ZERO), None);
        assert_eq!(cache.read("k", Duration::from_millis(1)), Some(json!(1)));
    }

    #[test]
    fn entries_expire_on_read() {
        let (cache, clock) = manual_cache(Box::new(MemoryStore::new()));
        cache.write("k", json!("v"));
        clock.advance(HOUR.as_millis() as i64);
        assert_eq!(cache.read("k", HOUR), Some(json!("v")), "boundary is inclusive");
        clock.advance(1);
        assert_eq!(cache.read("k", HOUR), None);
        // Freshness is per read, a longer policy still sees it
        assert_eq!(cache.read("k", HOUR * 2), Some(json!("v")));
    }

    #[test]
    fn persistent_hit_is_promoted() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(5_000));
        store
            .set("k", &json!({"timestamp": 4_000, "payload": [1, 2]}).to_string())
            .unwrap();

        let cache = CacheStore::with_clock(Box::new(store.clone()), clock);
        assert_eq!(cache.read("k", HOUR), Some(json!([1, 2])));

        // Gone from the persistent tier, still served from memory
        store.clear().unwrap();
        assert_eq!(cache.read("k", HOUR), Some(json!([1, 2])));
    }

    #[test]
    fn malformed_persisted_entries_are_misses() {
        let store = MemoryStore::new();
        store.set("not-json", "{{{").unwrap();
        store.set("no-timestamp", r#"{"payload": 1}"#).unwrap();
        store.set("text-timestamp", r#"{"timestamp": "yesterday", "payload": 1}"#).unwrap();
        store.set("no-payload", r#"{"timestamp": 1}"#).unwrap();
        store.set("array", "[1, 2]").unwrap();
        let (cache, _) = manual_cache(Box::new(store));
        for key in ["not-json", "no-timestamp", "text-timestamp", "no-payload", "array"] {
            assert_eq!(cache.read(key, Duration::MAX), None, "{key} should miss");
        }
    }

    #[test]
    fn persistent_write_failures_are_swallowed() {
        let (cache, _) = manual_cache(Box::new(DisabledStore));
        cache.write("k", json!({"big": true}));
        assert_eq!(cache.read("k", HOUR), Some(json!({"big": true})));

        let (cache, _) = manual_cache(Box::new(MemoryStore::with_quota(4)));
        cache.write("k", json!("too large for the quota"));
        assert_eq!(cache.read("k", HOUR), Some(json!("too large for the quota")));
    }

    #[test]
    fn clear_by_prefix_leaves_other_keys() {
        let store = Arc::new(MemoryStore::new());
        let (cache, _) = manual_cache(Box::new(store.clone()));
        cache.write("ns:a", json!(1));
        cache.write("ns:b", json!(2));
        cache.write("other:c", json!(3));

        cache.clear(Some("ns:"));

        assert_eq!(cache.read("ns:a", HOUR), None);
        assert_eq!(cache.read("ns:b", HOUR), None);
        assert_eq!(cache.read("other:c", HOUR), Some(json!(3)));
        assert_eq!(store.keys().unwrap(), vec!["other:c"]);
    }

    #[test]
    fn clear_all_empties_both_tiers() {
        let store = Arc::new(MemoryStore::new());
        let (cache, _) = manual_cache(Box::new(store.clone()));
        cache.write("a", json!(1));
        cache.write("b", json!(2));
        cache.clear(None);
        assert_eq!(cache.read("a", Duration::MAX), None);
        assert!(store.keys().unwrap().is_empty());
        assert!(cache.entries().is_empty());
    }

    #[test]
    fn typed_reads_reject_wrong_shapes() {
        let (cache, _) = manual_cache(Box::new(MemoryStore::new()));
        cache.write_as("labels", &vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            cache.read_as::<Vec<String>>("labels", HOUR),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(cache.read_as::<u32>("labels", HOUR), None);
    }

    #[test]
    fn last_writer_wins() {
        let (cache, clock) = manual_cache(Box::new(SqliteStore::open_in_memory().unwrap()));
        cache.write("k", json!("first"));
        clock.advance(10);
        cache.write("k", json!("second"));
        assert_eq!(cache.read("k", HOUR), Some(json!("second")));
        let info = cache.entries();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].timestamp, Some(1_700_000_000_010));
        assert!(info[0].in_memory && info[0].persisted);
    }

    #[test]
    fn floats_survive_the_persistent_tier_exactly() {
        let store = Arc::new(MemoryStore::new());
        let mut floats = vec![7.743_631_996_126_282_5, 1.136_227_511_627_652_3e-8, 45.464_211_f64];
        // Spread of bit patterns, not just short decimals
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        while floats.len() < 500 {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            let value = f64::from_bits(state >> 2);
            if value.is_finite() {
                floats.push(value);
            }
        }
        let payload = json!({ "values": floats });

        let (writer, _) = manual_cache(Box::new(store.clone()));
        writer.write("floats", payload.clone());

        let (reader, _) = manual_cache(Box::new(store));
        assert_eq!(reader.read("floats", Duration::MAX), Some(payload));
    }

    /// Memory store whose removals can be switched off.
    #[derive(Default)]
    struct StubbornStore {
        inner: MemoryStore,
        refuse_removal: std::sync::atomic::AtomicBool,
    }

    impl StubbornStore {
        fn check(&self) -> Result<(), StoreError> {
            if self.refuse_removal.load(std::sync::atomic::Ordering::SeqCst) {
                Err(StoreError::Disabled)
            } else {
                Ok(())
            }
        }
    }

    impl PersistentStore for StubbornStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.check()?;
            self.inner.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>, StoreError> {
            self.inner.keys()
        }

        fn clear(&self) -> Result<(), StoreError> {
            self.check()?;
            self.inner.clear()
        }
    }

    #[test]
    fn refused_clear_still_hides_entries() {
        let store = Arc::new(StubbornStore::default());
        let (cache, clock) = manual_cache(Box::new(store.clone()));
        cache.write("ns:a", json!(1));
        cache.write("other:b", json!(2));
        store.refuse_removal.store(true, std::sync::atomic::Ordering::SeqCst);

        cache.clear(Some("ns:"));
        assert_eq!(store.inner.keys().unwrap(), vec!["ns:a", "other:b"]);
        assert_eq!(cache.read("ns:a", Duration::MAX), None);
        assert_eq!(cache.read("ns:a", Duration::MAX), None, "not promoted back");
        assert_eq!(cache.read("other:b", Duration::MAX), Some(json!(2)));

        // Writes after the clear are visible again
        clock.advance(1);
        cache.write("ns:a", json!(3));
        assert_eq!(cache.read("ns:a", Duration::MAX), Some(json!(3)));

        cache.clear(None);
        assert_eq!(cache.read("other:b", Duration::MAX), None);
        assert_eq!(cache.read("ns:a", Duration::MAX), None);

        // Once the store cooperates the tombstones go away with the entries
        store.refuse_removal.store(false, std::sync::atomic::Ordering::SeqCst);
        cache.clear(None);
        assert!(store.inner.keys().unwrap().is_empty());
        assert!(cache.tombstones().is_empty());
        cache.write("ns:a", json!(4));
        assert_eq!(cache.read("ns:a", Duration::MAX), Some(json!(4)));
    }
}
