//! Schema upgrades for the sqlite-backed key-value store.
//!
//! The schema version lives in `PRAGMA user_version`. Opening a store applies
//! every entry of [`MIGRATIONS`] above that version, each in its own
//! transaction together with the version bump. A database written by a newer
//! build is left as it is.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version, starting at 1.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "kv",
    // One row per store key: message caches, sync markers, outboxes, preferences.
    sql: "CREATE TABLE IF NOT EXISTS kv (
              key        TEXT PRIMARY KEY NOT NULL,
              value      TEXT NOT NULL,
              updated_at TEXT NOT NULL
          );",
}];

fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the schema of `conn` up to the latest version.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;
    let latest = latest_version();

    if current > latest {
        tracing::warn!(
            schema_version = current,
            known_version = latest,
            "Store schema is newer than this build, leaving it untouched"
        );
        return Ok(());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!(version = migration.version, name = migration.name, "Migrating store schema");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql).map_err(|e| {
            StoreError::Migration(format!("v{} ({}): {e}", migration.version, migration.name))
        })?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
    }

    Ok(())
}
