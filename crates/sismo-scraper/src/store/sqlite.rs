//! SQLite-backed key-value store.
//!
//! One table, `id TEXT PRIMARY KEY` plus the record serialized as JSON.
//! The table name comes from configuration and is checked to be a plain
//! identifier before it is interpolated into SQL.

use super::KeyValueStore;
use crate::error::StoreError;
use crate::types::StoredReport;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Key-value store backed by a single SQLite table.
pub struct SqliteStore {
    db: Connection,
    table: String,
}

impl SqliteStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path, table: &str) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(path)?, table)
    }

    /// In-memory SQLite database, mostly for tests.
    pub fn open_in_memory(table: &str) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(db: Connection, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;

        db.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id TEXT PRIMARY KEY,
                item TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );"
        ))?;

        Ok(Self {
            db,
            table: table.to_string(),
        })
    }

    /// Default store location: `~/.sismo-scraper/sismos.db`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".sismo-scraper")
            .join("sismos.db")
    }
}

/// Table names are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` is allowed.
pub fn validate_table_name(table: &str) -> Result<(), StoreError> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTable(table.to_string()))
    }
}

impl KeyValueStore for SqliteStore {
    fn scan(&self) -> Result<Vec<StoredReport>, StoreError> {
        let mut stmt = self
            .db
            .prepare(&format!("SELECT item FROM \"{}\" ORDER BY id", self.table))?;

        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut items = Vec::new();
        for raw in rows {
            items.push(serde_json::from_str(&raw?)?);
        }
        Ok(items)
    }

    fn put(&mut self, item: &StoredReport) -> Result<(), StoreError> {
        let json = serde_json::to_string(item)?;
        self.db.execute(
            &format!(
                "INSERT OR REPLACE INTO \"{}\" (id, item, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)",
                self.table
            ),
            rusqlite::params![item.id, json],
        )?;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.db.execute(
            &format!("DELETE FROM \"{}\" WHERE id = ?1", self.table),
            rusqlite::params![id],
        )?;
        Ok(())
    }
}
