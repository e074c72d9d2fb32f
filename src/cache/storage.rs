//! Key-value store implementations: SQLite, in-memory, and no-op.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

use super::traits::KeyValueStore;

/// Store implementation that doesn't keep anything.
/// Used when caching is disabled - every lookup misses, every write is dropped.
pub struct NoopStore;

#[async_trait]
impl KeyValueStore for NoopStore {
  async fn get(&self, _key: &str) -> Result<Option<Value>> {
    Ok(None) // Always miss
  }

  async fn set(&self, _key: &str, _value: Value) -> Result<()> {
    Ok(()) // Discard
  }

  async fn remove(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  async fn keys(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }
}

/// In-process store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
  async fn get(&self, key: &str) -> Result<Option<Value>> {
    Ok(self.lock()?.get(key).cloned())
  }

  async fn set(&self, key: &str, value: Value) -> Result<()> {
    self.lock()?.insert(key.to_string(), value);
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<()> {
    self.lock()?.remove(key);
    Ok(())
  }

  async fn keys(&self) -> Result<Vec<String>> {
    let mut keys: Vec<String> = self.lock()?.keys().cloned().collect();
    keys.sort();
    Ok(keys)
  }
}

/// SQLite-based store. Values are kept as JSON blobs.
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

/// Schema for the key-value table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStore {
  /// Open the store at `path`, or at the default location when `None`.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("prlens").join("cache.db"))
  }

  /// Run `f` against the connection on the blocking pool.
  async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    let conn = Arc::clone(&self.conn);
    tokio::task::spawn_blocking(move || {
      let conn = conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
      f(&conn)
    })
    .await
    .map_err(|e| eyre!("Cache task failed: {}", e))?
  }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
  async fn get(&self, key: &str) -> Result<Option<Value>> {
    let key = key.to_string();
    self
      .with_conn(move |conn| {
        let data: Option<Vec<u8>> = conn
          .query_row(
            "SELECT value FROM kv_store WHERE key = ?",
            params![key],
            |row| row.get(0),
          )
          .optional()
          .map_err(|e| eyre!("Failed to read cache key {}: {}", key, e))?;

        Ok(data.and_then(|bytes| match serde_json::from_slice(&bytes) {
          Ok(value) => Some(value),
          Err(e) => {
            warn!(key = %key, error = %e, "Ignoring unreadable cache value");
            None
          }
        }))
      })
      .await
  }

  async fn set(&self, key: &str, value: Value) -> Result<()> {
    let key = key.to_string();
    let data = serde_json::to_vec(&value).map_err(|e| eyre!("Failed to serialize value: {}", e))?;
    self
      .with_conn(move |conn| {
        conn
          .execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
             VALUES (?, ?, datetime('now'))",
            params![key, data],
          )
          .map_err(|e| eyre!("Failed to store cache key {}: {}", key, e))?;
        Ok(())
      })
      .await
  }

  async fn remove(&self, key: &str) -> Result<()> {
    let key = key.to_string();
    self
      .with_conn(move |conn| {
        conn
          .execute("DELETE FROM kv_store WHERE key = ?", params![key])
          .map_err(|e| eyre!("Failed to remove cache key {}: {}", key, e))?;
        Ok(())
      })
      .await
  }

  async fn keys(&self) -> Result<Vec<String>> {
    self
      .with_conn(|conn| {
        let mut stmt = conn
          .prepare("SELECT key FROM kv_store ORDER BY key")
          .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

        let keys = stmt
          .query_map([], |row| row.get::<_, String>(0))
          .map_err(|e| eyre!("Failed to list cache keys: {}", e))?
          .filter_map(|r| r.ok())
          .collect();

        Ok(keys)
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn test_sqlite_roundtrip_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let store = SqliteStore::open(Some(path.as_path())).unwrap();
      store.set("reviewers:a/b", json!({ "timestamp": 1, "data": {} })).await.unwrap();
    }

    let store = SqliteStore::open(Some(path.as_path())).unwrap();
    assert_eq!(
      store.get("reviewers:a/b").await.unwrap(),
      Some(json!({ "timestamp": 1, "data": {} }))
    );
  }

  #[tokio::test]
  async fn test_sqlite_set_replaces_and_remove_deletes() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("k", json!(1)).await.unwrap();
    store.set("k", json!(2)).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));

    store.remove("k").await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), None);

    // Removing again is fine
    store.remove("k").await.unwrap();
  }

  #[tokio::test]
  async fn test_sqlite_unreadable_value_is_absent() {
    let store = SqliteStore::open_in_memory().unwrap();
    {
      let conn = store.conn.lock().unwrap();
      conn
        .execute(
          "INSERT INTO kv_store (key, value) VALUES (?, ?)",
          params!["broken", b"{not json".to_vec()],
        )
        .unwrap();
    }
    assert_eq!(store.get("broken").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_sqlite_keys_sorted() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set("reviewers:b/x", json!({})).await.unwrap();
    store.set("reviewers:a/x", json!({})).await.unwrap();
    assert_eq!(
      store.keys().await.unwrap(),
      vec!["reviewers:a/x".to_string(), "reviewers:b/x".to_string()]
    );
  }

  #[tokio::test]
  async fn test_memory_store() {
    let store = MemoryStore::new();
    assert_eq!(store.get("k").await.unwrap(), None);
    store.set("k", json!("v")).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some(json!("v")));
    assert_eq!(store.keys().await.unwrap(), vec!["k".to_string()]);
    store.remove("k").await.unwrap();
    assert!(store.keys().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_noop_store_never_keeps_anything() {
    let store = NoopStore;
    store.set("k", json!("v")).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), None);
    assert!(store.keys().await.unwrap().is_empty());
  }
}
