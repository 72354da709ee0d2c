//! SQLite-backed persisted tier.
//!
//! A plain key/value table with the `getItem` / `setItem` contract, so the
//! last activity time survives restarts and can be read by `idlewatch status`
//! while a watcher is running.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use idlewatch::db::local_storage::LocalStorage;
//! use idlewatch::libs::tiers::KeyValueStore;
//!
//! let mut storage = LocalStorage::new()?;
//! storage.set_item("IDLEMONITOR_ACTIVITY_lastActive", "1700000000000")?;
//! assert!(storage.get_item("IDLEMONITOR_ACTIVITY_lastActive")?.is_some());
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::db::db::Db;
use crate::libs::tiers::KeyValueStore;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA_LOCAL_STORAGE: &str = "CREATE TABLE IF NOT EXISTS local_storage (
    key TEXT NOT NULL PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT (datetime(CURRENT_TIMESTAMP, 'localtime'))
)";

const SELECT_ITEM: &str = "SELECT value FROM local_storage WHERE key = ?1";

const UPSERT_ITEM: &str = "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime(CURRENT_TIMESTAMP, 'localtime')";

pub struct LocalStorage {
    conn: Connection,
}

impl LocalStorage {
    /// Opens the application database and ensures the table exists.
    pub fn new() -> Result<LocalStorage> {
        Self::with_connection(Db::new()?.conn)
    }

    /// Opens a storage file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<LocalStorage> {
        Self::with_connection(Db::open(path)?.conn)
    }

    fn with_connection(conn: Connection) -> Result<LocalStorage> {
        conn.execute(SCHEMA_LOCAL_STORAGE, [])?;
        Ok(LocalStorage { conn })
    }
}

impl KeyValueStore for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(SELECT_ITEM, params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(UPSERT_ITEM, params![key, value])?;
        Ok(())
    }
}
