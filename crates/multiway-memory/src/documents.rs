//! SQLite-backed JSON document store.

use chrono::Utc;
use multiway_types::error::{RelayError, RelayResult};
use multiway_types::storage::DocumentStore;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::migration::run_migrations;

/// Document store backed by a single SQLite `documents` table.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> RelayResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| RelayError::Memory(e.to_string()))?;
        run_migrations(&conn).map_err(|e| RelayError::Memory(e.to_string()))?;
        info!(path = %path.display(), "Opened document store");
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> RelayResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| RelayError::Memory(e.to_string()))?;
        run_migrations(&conn).map_err(|e| RelayError::Memory(e.to_string()))?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// Wrap an already-migrated connection.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Number of times a document has been written, if it exists.
    pub fn version(&self, key: &str) -> RelayResult<Option<u32>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RelayError::Internal(e.to_string()))?;
        let result = conn.query_row(
            "SELECT version FROM documents WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get::<_, u32>(0),
        );
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(RelayError::Memory(e.to_string())),
        }
    }

    /// All stored document keys, sorted.
    pub fn keys(&self) -> RelayResult<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RelayError::Internal(e.to_string()))?;
        let mut stmt = conn
            .prepare("SELECT key FROM documents ORDER BY key")
            .map_err(|e| RelayError::Memory(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| RelayError::Memory(e.to_string()))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|e| RelayError::Memory(e.to_string()))?);
        }
        Ok(keys)
    }

    /// Write raw bytes under a key, bypassing JSON encoding.
    #[cfg(test)]
    fn save_raw(&self, key: &str, blob: &[u8]) -> RelayResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RelayError::Internal(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (key, value, version, updated_at) VALUES (?1, ?2, 1, ?3)",
            rusqlite::params![key, blob, Utc::now().to_rfc3339()],
        )
        .map_err(|e| RelayError::Memory(e.to_string()))?;
        Ok(())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn load(&self, key: &str) -> RelayResult<Option<serde_json::Value>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RelayError::Internal(e.to_string()))?;
        let result = conn.query_row(
            "SELECT value FROM documents WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get::<_, Vec<u8>>(0),
        );
        match result {
            Ok(blob) => {
                let value = serde_json::from_slice(&blob)
                    .map_err(|e| RelayError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(RelayError::Memory(e.to_string())),
        }
    }

    fn save(&self, key: &str, value: serde_json::Value) -> RelayResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RelayError::Internal(e.to_string()))?;
        let blob =
            serde_json::to_vec(&value).map_err(|e| RelayError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO documents (key, value, version, updated_at) VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, version = version + 1, updated_at = ?3",
            rusqlite::params![key, blob, now],
        )
        .map_err(|e| RelayError::Memory(e.to_string()))?;
        debug!(key, "Saved document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_document_is_none() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        assert!(store.load("relays").unwrap().is_none());
        assert!(store.version("relays").unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_bumps_version() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.save("relays", json!({"a": {"chans": ["1", "2"]}})).unwrap();
        store.save("relays", json!({})).unwrap();
        assert_eq!(store.load("relays").unwrap(), Some(json!({})));
        assert_eq!(store.version("relays").unwrap(), Some(2));
    }

    #[test]
    fn test_documents_are_independent() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.save("broadcasts", json!({"1": ["2"]})).unwrap();
        store.save("rss", json!({"links": {}, "opts": {}})).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["broadcasts", "rss"]);
        assert_eq!(store.load("broadcasts").unwrap(), Some(json!({"1": ["2"]})));
    }

    #[test]
    fn test_corrupt_blob_is_serialization_error() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.save_raw("relays", b"{not json").unwrap();
        let err = store.load("relays").unwrap_err();
        assert!(matches!(err, RelayError::Serialization(_)));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("multiway.db");
        {
            let store = SqliteDocumentStore::open(&path).unwrap();
            store.save("rss", json!({"links": {"5": "6"}})).unwrap();
        }
        let store = SqliteDocumentStore::open(&path).unwrap();
        assert_eq!(
            store.load("rss").unwrap(),
            Some(json!({"links": {"5": "6"}}))
        );
    }
}
