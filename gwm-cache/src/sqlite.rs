//! SQLite-backed persistent tier.

use crate::store::{PersistentStore, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Schema for the key/value table. Safe to apply repeatedly.
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#
}

/// Key/value store in a single SQLite table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    quota_bytes: Option<usize>,
}

impl SqliteStore {
    /// Open (creating if needed) a store file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Store that lives only as long as the process.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(create_schema())?;
        Ok(Self {
            conn: Mutex::new(conn),
            quota_bytes: None,
        })
    }

    /// Refuse writes that would push keys plus values over `quota_bytes`.
    pub fn with_quota(mut self, quota_bytes: Option<usize>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl PersistentStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        if let Some(quota) = self.quota_bytes {
            let others: i64 = conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                 FROM kv WHERE key != ?1",
                params![key],
                |row| row.get(0),
            )?;
            let needed = usize::try_from(others).unwrap_or(usize::MAX) + key.len() + value.len();
            if needed > quota {
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        conn.execute_batch(create_schema())
            .expect("Applying schema twice should succeed due to IF NOT EXISTS");
    }

    #[test]
    fn set_get_remove() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("var_points_v1:depth:*", "{}").unwrap();
        store.set("var_points_v1:depth:*", "{\"x\":1}").unwrap();
        assert_eq!(
            store.get("var_points_v1:depth:*").unwrap().as_deref(),
            Some("{\"x\":1}")
        );
        assert_eq!(store.keys().unwrap().len(), 1, "upsert keeps one row");
        store.remove("var_points_v1:depth:*").unwrap();
        assert_eq!(store.get("var_points_v1:depth:*").unwrap(), None);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("a", "1").unwrap();
            store.set("b", "2").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn quota_is_enforced() {
        let store = SqliteStore::open_in_memory().unwrap().with_quota(Some(8));
        store.set("a", "1234").unwrap();
        assert!(matches!(
            store.set("b", "12345"),
            Err(StoreError::QuotaExceeded { needed: 11, quota: 8 })
        ));
        assert_eq!(store.get("b").unwrap(), None);
    }
}
