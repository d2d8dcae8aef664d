//! Persisted snapshot storage: trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

use super::key::QueryKey;

/// Fixed storage key of the persisted query snapshot.
pub const STORAGE_KEY: &str = "WORKLOG_QUERY_OFFLINE_CACHE";

/// Serialized form of the persistable part of the query cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
  /// Snapshots written under a different buster are discarded on load
  pub buster: String,
  pub saved_at: DateTime<Utc>,
  pub entries: Vec<PersistedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry {
  pub key: QueryKey,
  pub data: Value,
  pub fetched_at: DateTime<Utc>,
}

/// Trait for snapshot storage backends.
pub trait CacheStorage: Send + Sync {
  /// Read the stored snapshot, if any.
  fn load(&self) -> Result<Option<PersistedSnapshot>>;

  /// Replace the stored snapshot.
  fn save(&self, snapshot: &PersistedSnapshot) -> Result<()>;

  /// Remove the stored snapshot.
  fn clear(&self) -> Result<()>;
}

impl<S: CacheStorage + ?Sized> CacheStorage for Box<S> {
  fn load(&self) -> Result<Option<PersistedSnapshot>> {
    (**self).load()
  }

  fn save(&self, snapshot: &PersistedSnapshot) -> Result<()> {
    (**self).save(snapshot)
  }

  fn clear(&self) -> Result<()> {
    (**self).clear()
  }
}

/// Storage implementation that doesn't persist anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn load(&self) -> Result<Option<PersistedSnapshot>> {
    Ok(None) // Always miss
  }

  fn save(&self, _snapshot: &PersistedSnapshot) -> Result<()> {
    Ok(()) // Discard
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based snapshot storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for the local key/value table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_storage (
    storage_key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

impl CacheStorage for SqliteStorage {
  fn load(&self) -> Result<Option<PersistedSnapshot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM local_storage WHERE storage_key = ?",
        params![STORAGE_KEY],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache snapshot: {}", e))?;

    match data {
      Some(data) => {
        let snapshot = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize cache snapshot: {}", e))?;
        Ok(Some(snapshot))
      }
      None => Ok(None),
    }
  }

  fn save(&self, snapshot: &PersistedSnapshot) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let data =
      serde_json::to_vec(snapshot).map_err(|e| eyre!("Failed to serialize cache snapshot: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO local_storage (storage_key, data, saved_at)
         VALUES (?, ?, datetime('now'))",
        params![STORAGE_KEY, data],
      )
      .map_err(|e| eyre!("Failed to store cache snapshot: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM local_storage WHERE storage_key = ?",
        params![STORAGE_KEY],
      )
      .map_err(|e| eyre!("Failed to clear cache snapshot: {}", e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn snapshot() -> PersistedSnapshot {
    PersistedSnapshot {
      buster: "test".to_string(),
      saved_at: Utc::now(),
      entries: vec![PersistedEntry {
        key: QueryKey::exercises("r-1"),
        data: json!([{ "id": "e-1" }]),
        fetched_at: Utc::now(),
      }],
    }
  }

  #[test]
  fn test_sqlite_save_load_clear() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    let storage = SqliteStorage::open(&path).unwrap();
    assert!(storage.load().unwrap().is_none());

    let snap = snapshot();
    storage.save(&snap).unwrap();
    drop(storage);

    // Survives reopening the database
    let storage = SqliteStorage::open(&path).unwrap();
    assert_eq!(storage.load().unwrap(), Some(snap));

    storage.clear().unwrap();
    assert!(storage.load().unwrap().is_none());
  }

  #[test]
  fn test_noop_storage_never_returns_data() {
    let storage = NoopStorage;
    storage.save(&snapshot()).unwrap();
    assert!(storage.load().unwrap().is_none());
  }
}
