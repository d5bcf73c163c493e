//! Generation store backends: SQLite for production, in-memory for tests.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use super::traits::{GenerationStore, RequestKey, StoredResponse};
use crate::net::ResponseKind;

/// In-memory generation store.
///
/// Backs the test suite and keeps the trait honest with a second
/// implementation; it holds nothing across process restarts.
#[derive(Default)]
pub struct MemoryStore {
  generations: Mutex<BTreeMap<String, BTreeMap<String, StoredResponse>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, StoredResponse>>>> {
    self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl GenerationStore for MemoryStore {
  fn open_generation(&self, tag: &str) -> Result<()> {
    self.lock()?.entry(tag.to_string()).or_default();
    Ok(())
  }

  fn list_generations(&self) -> Result<Vec<String>> {
    Ok(self.lock()?.keys().cloned().collect())
  }

  fn delete_generation(&self, tag: &str) -> Result<bool> {
    Ok(self.lock()?.remove(tag).is_some())
  }

  fn get(&self, tag: &str, key: &RequestKey) -> Result<Option<StoredResponse>> {
    Ok(
      self
        .lock()?
        .get(tag)
        .and_then(|entries| entries.get(&key.hash()))
        .cloned(),
    )
  }

  fn put(&self, tag: &str, key: &RequestKey, response: &StoredResponse) -> Result<()> {
    self
      .lock()?
      .entry(tag.to_string())
      .or_default()
      .insert(key.hash(), response.clone());
    Ok(())
  }

  fn entry_count(&self, tag: &str) -> Result<u64> {
    Ok(
      self
        .lock()?
        .get(tag)
        .map(|entries| entries.len() as u64)
        .unwrap_or(0),
    )
  }
}

/// SQLite-backed generation store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create data directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open generation store at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a transient in-memory store.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("offgate").join("generations.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for the generation store.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generations (
    tag TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Cached responses, keyed by generation tag + request key hash
CREATE TABLE IF NOT EXISTS entries (
    tag TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    kind TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    headers BLOB NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (tag, key_hash),
    FOREIGN KEY (tag) REFERENCES generations(tag) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_tag ON entries(tag);
"#;

impl GenerationStore for SqliteStore {
  fn open_generation(&self, tag: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO generations (tag) VALUES (?)",
        params![tag],
      )
      .map_err(|e| eyre!("Failed to open generation {}: {}", tag, e))?;

    Ok(())
  }

  fn list_generations(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT tag FROM generations ORDER BY created_at, tag")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let tags = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list generations: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(tags)
  }

  fn delete_generation(&self, tag: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM entries WHERE tag = ?", params![tag])
      .map_err(|e| eyre!("Failed to delete entries for {}: {}", tag, e))?;

    let deleted = conn
      .execute("DELETE FROM generations WHERE tag = ?", params![tag])
      .map_err(|e| eyre!("Failed to delete generation {}: {}", tag, e))?;

    Ok(deleted > 0)
  }

  fn get(&self, tag: &str, key: &RequestKey) -> Result<Option<StoredResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT kind, status, status_text, headers, body, cached_at
         FROM entries WHERE tag = ? AND key_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(String, u16, String, Vec<u8>, Vec<u8>, String)> = stmt
      .query_row(params![tag, key.hash()], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
          row.get(5)?,
        ))
      })
      .ok();

    match row {
      Some((kind, status, status_text, headers, body, cached_at)) => {
        let headers: BTreeMap<String, String> = serde_json::from_slice(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;

        Ok(Some(StoredResponse {
          kind: ResponseKind::parse(&kind)?,
          status,
          status_text,
          headers,
          body,
          cached_at: parse_datetime(&cached_at)?,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, tag: &str, key: &RequestKey, response: &StoredResponse) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_vec(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    // Writing to an unopened tag registers the generation implicitly
    conn
      .execute(
        "INSERT OR IGNORE INTO generations (tag) VALUES (?)",
        params![tag],
      )
      .map_err(|e| eyre!("Failed to register generation {}: {}", tag, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entries
           (tag, key_hash, method, url, kind, status, status_text, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
          tag,
          key.hash(),
          key.method().as_str(),
          key.url(),
          response.kind.as_str(),
          response.status,
          response.status_text,
          headers,
          response.body,
          format_datetime(response.cached_at),
        ],
      )
      .map_err(|e| eyre!("Failed to store entry {}: {}", key.description(), e))?;

    Ok(())
  }

  fn entry_count(&self, tag: &str) -> Result<u64> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: u64 = conn
      .query_row(
        "SELECT COUNT(*) FROM entries WHERE tag = ?",
        params![tag],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries for {}: {}", tag, e))?;

    Ok(count)
  }
}

fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
