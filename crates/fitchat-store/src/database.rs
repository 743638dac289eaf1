//! SQLite-backed key-value store.
//!
//! [`SqliteStore`] owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. An optional byte capacity
//! emulates the per-origin quota of browser storage so the same recovery
//! paths are exercised on every platform.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::kv::KeyValueStore;
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
    capacity: Option<usize>,
}

impl SqliteStore {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/fitchat/fitchat.db`
    /// - macOS:   `~/Library/Application Support/com.fitapp.fitchat/fitchat.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\fitapp\fitchat\data\fitchat.db`
    pub fn new(capacity: Option<usize>) -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "fitapp", "fitchat").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("fitchat.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path, capacity)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path, capacity: Option<usize>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::from_connection(conn, capacity)
    }

    /// A private in-memory database, mostly for tests.
    pub fn in_memory(capacity: Option<usize>) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, capacity)
    }

    fn from_connection(conn: Connection, capacity: Option<usize>) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            capacity,
        })
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn().path().map(PathBuf::from)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn usage(conn: &Connection) -> Result<usize> {
    let used: i64 = conn.query_row(
        "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv",
        [],
        |row| row.get(0),
    )?;
    Ok(used.max(0) as usize)
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();

        if let Some(capacity) = self.capacity {
            let replaced: i64 = conn
                .query_row(
                    "SELECT LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))
                     FROM kv WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?
                .unwrap_or(0);
            let needed = usage(&conn)? - replaced.max(0) as usize + key.len() + value.len();
            if needed > capacity {
                return Err(StoreError::QuotaExceeded { needed, capacity });
            }
        }

        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    fn usage_bytes(&self) -> Result<usize> {
        usage(&self.conn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let store = SqliteStore::open_at(&path, None).expect("should open");
        assert!(store.path().is_some());
        store.set("greeting", "hello").unwrap();
        drop(store);

        let reopened = SqliteStore::open_at(&path, None).unwrap();
        assert_eq!(reopened.get("greeting").unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn upsert_replaces_value() {
        let store = SqliteStore::in_memory(None).unwrap();
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
        assert_eq!(store.keys().unwrap(), vec!["k".to_string()]);
        assert_eq!(store.usage_bytes().unwrap(), 4);
    }

    #[test]
    fn capacity_is_enforced() {
        let store = SqliteStore::in_memory(Some(16)).unwrap();
        store.set("a", "0123456789").unwrap();
        let err = store.set("b", "0123456789").unwrap_err();
        assert!(err.is_quota_exceeded());

        store.remove("a").unwrap();
        store.set("b", "0123456789").unwrap();
    }

    #[test]
    fn missing_key_is_none() {
        let store = SqliteStore::in_memory(None).unwrap();
        assert_eq!(store.get("nope").unwrap(), None);
    }
}
