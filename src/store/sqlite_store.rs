//! SQLite-backed persisted store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::interface::SaveStore;
use super::record::SaveRecord;
use crate::utilities::errors::StoreError;

/// SQLite implementation of [`SaveStore`].
///
/// One row per slot in a `save_slots` table. The connection is guarded by a
/// mutex so synchronous callers and the background I/O worker can share it.
#[derive(Debug)]
pub struct SqliteSaveStore {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteSaveStore {
    /// Open (or create) a database at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&db_path)?;
        let store = Self {
            db_path,
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let store = Self {
            db_path: PathBuf::from(":memory:"),
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS save_slots (
                name TEXT PRIMARY KEY NOT NULL,
                class TEXT NOT NULL,
                version INTEGER NOT NULL,
                saved_at TEXT NOT NULL,
                data_json TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl SaveStore for SqliteSaveStore {
    fn exists(&self, name: &str) -> bool {
        let conn = self.conn.lock();
        let found: Result<Option<i64>, rusqlite::Error> = conn
            .query_row(
                "SELECT 1 FROM save_slots WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional();
        match found {
            Ok(found) => found.is_some(),
            Err(e) => {
                log::error!("SqliteSaveStore::exists: slot={} failed: {}", name, e);
                false
            }
        }
    }

    fn delete(&self, name: &str) -> bool {
        let conn = self.conn.lock();
        match conn.execute("DELETE FROM save_slots WHERE name = ?1", params![name]) {
            Ok(rows) => rows > 0,
            Err(e) => {
                log::error!("SqliteSaveStore::delete: slot={} failed: {}", name, e);
                false
            }
        }
    }

    fn save(&self, name: &str, record: &SaveRecord) -> Result<(), StoreError> {
        let data_json = serde_json::to_string(&record.data)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO save_slots (name, class, version, saved_at, data_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                record.class,
                record.version,
                record.saved_at.to_rfc3339(),
                data_json
            ],
        )?;

        log::debug!("SqliteSaveStore::save: slot={}, class={}", name, record.class);
        Ok(())
    }

    fn restore(&self, name: &str) -> Result<Option<SaveRecord>, StoreError> {
        let conn = self.conn.lock();
        let row: Option<(String, u32, String, String)> = conn
            .query_row(
                "SELECT class, version, saved_at, data_json FROM save_slots WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((class, version, saved_at, data_json)) = row else {
            return Ok(None);
        };
        let saved_at = DateTime::parse_from_rfc3339(&saved_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StoreError::other(format!("bad saved_at for slot {}: {}", name, e)))?;

        Ok(Some(SaveRecord {
            class,
            version,
            saved_at,
            data: serde_json::from_str(&data_json)?,
        }))
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name FROM save_slots ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}
