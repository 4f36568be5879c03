//! Durable, prefix-scoped key-value store with per-entry expiration.
//!
//! This is the persistence backbone for the client: auth tokens, user
//! preferences, short-lived response caching, and the diagnostic error log
//! all live here. The store shares one `kv` table with whatever else the
//! host application keeps in the same database, but only ever touches rows
//! carrying its own prefix.
//!
//! Failure policy: no operation on an opened store propagates an error.
//! Storage faults (database unavailable, corrupt payload) degrade to
//! `false`/`None` and a log line, so callers never need a recovery path.

mod entry;

pub use entry::CacheEntry;

use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Prefix applied to every key this store owns.
const KEY_PREFIX: &str = "reelkit_";
/// Sub-prefix for the short-lived response-cache region.
const CACHE_PREFIX: &str = "cache_";
/// Key holding the composite preference map.
const PREFS_KEY: &str = "user_preferences";
/// Key holding the bearer token.
const AUTH_TOKEN_KEY: &str = "auth_token";

/// Schema for the shared key-value table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    data TEXT NOT NULL
);
"#;

/// Prefixed key-value store over SQLite.
///
/// Open with [`Store::open`] (durable, on disk) or [`Store::session`]
/// (in memory, gone on process exit). Both expose the same operations.
pub struct Store {
  conn: Mutex<Connection>,
}

impl Store {
  /// Open or create the durable store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    Self::open_at(&path)
  }

  /// Open or create the durable store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;
    Self::init(conn)
  }

  /// Open a session-scoped store. Same API, but contents do not survive
  /// the process.
  pub fn session() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open session store: {}", e))?;
    Self::init(conn)
  }

  fn init(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("reelkit").join("store.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn full_key(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
  }

  /// Store `value` under `key`, expiring after `ttl` if one is given.
  /// Returns `false` on any storage fault.
  pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
    match self.try_set(key, value, ttl) {
      Ok(()) => true,
      Err(e) => {
        warn!(key, error = %e, "store write failed");
        false
      }
    }
  }

  fn try_set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
    let entry = CacheEntry::new(value, ttl);
    let data = serde_json::to_string(&entry).map_err(|e| eyre!("Failed to serialize: {}", e))?;

    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv (key, data) VALUES (?1, ?2)",
        params![Self::full_key(key), data],
      )
      .map_err(|e| eyre!("Failed to write key: {}", e))?;
    Ok(())
  }

  /// Read the value under `key`. Returns `None` if absent, unreadable, or
  /// expired; an expired entry is deleted as a side effect of the read.
  pub fn get(&self, key: &str) -> Option<Value> {
    match self.try_get(key) {
      Ok(found) => found,
      Err(e) => {
        warn!(key, error = %e, "store read failed");
        None
      }
    }
  }

  fn try_get(&self, key: &str) -> Result<Option<Value>> {
    let full_key = Self::full_key(key);
    let conn = self.lock()?;

    let row: Option<String> = conn
      .query_row("SELECT data FROM kv WHERE key = ?1", params![full_key], |r| {
        r.get(0)
      })
      .optional()
      .map_err(|e| eyre!("Failed to read key: {}", e))?;

    let Some(text) = row else { return Ok(None) };

    // A corrupt payload reads as a miss
    let entry: CacheEntry = match serde_json::from_str(&text) {
      Ok(entry) => entry,
      Err(_) => return Ok(None),
    };

    if entry.is_expired() {
      conn
        .execute("DELETE FROM kv WHERE key = ?1", params![full_key])
        .map_err(|e| eyre!("Failed to evict expired key: {}", e))?;
      return Ok(None);
    }

    Ok(Some(entry.value))
  }

  /// Delete the entry under `key`. Returns `false` only on a storage fault.
  pub fn remove(&self, key: &str) -> bool {
    let result = self.lock().and_then(|conn| {
      conn
        .execute("DELETE FROM kv WHERE key = ?1", params![Self::full_key(key)])
        .map_err(|e| eyre!("Failed to delete key: {}", e))
    });
    match result {
      Ok(_) => true,
      Err(e) => {
        warn!(key, error = %e, "store delete failed");
        false
      }
    }
  }

  /// Delete every entry this store owns. Rows without this store's prefix
  /// are never touched, even in a shared database.
  pub fn clear(&self) -> bool {
    self.clear_glob(&format!("{KEY_PREFIX}*"))
  }

  /// Delete only the response-cache region, leaving tokens, preferences
  /// and the error log in place.
  pub fn clear_cached(&self) -> bool {
    self.clear_glob(&format!("{KEY_PREFIX}{CACHE_PREFIX}*"))
  }

  fn clear_glob(&self, pattern: &str) -> bool {
    let result = self.lock().and_then(|conn| {
      conn
        .execute("DELETE FROM kv WHERE key GLOB ?1", params![pattern])
        .map_err(|e| eyre!("Failed to clear keys: {}", e))
    });
    match result {
      Ok(_) => true,
      Err(e) => {
        warn!(error = %e, "store clear failed");
        false
      }
    }
  }

  /// Every live (non-expired) entry, keyed without the store prefix.
  pub fn get_all(&self) -> BTreeMap<String, Value> {
    match self.try_get_all() {
      Ok(map) => map,
      Err(e) => {
        warn!(error = %e, "store scan failed");
        BTreeMap::new()
      }
    }
  }

  fn try_get_all(&self) -> Result<BTreeMap<String, Value>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT key, data FROM kv WHERE key GLOB ?1")
      .map_err(|e| eyre!("Failed to prepare scan: {}", e))?;

    let rows: Vec<(String, String)> = stmt
      .query_map(params![format!("{KEY_PREFIX}*")], |r| {
        Ok((r.get(0)?, r.get(1)?))
      })
      .map_err(|e| eyre!("Failed to scan keys: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    let mut map = BTreeMap::new();
    for (full_key, text) in rows {
      let Ok(entry) = serde_json::from_str::<CacheEntry>(&text) else {
        continue;
      };
      if entry.is_expired() {
        continue;
      }
      let Some(key) = full_key.strip_prefix(KEY_PREFIX) else {
        continue;
      };
      map.insert(key.to_string(), entry.value);
    }
    Ok(map)
  }

  /// Cache a response payload under the `cache_` region. Defaults to a
  /// one-hour lifetime when no `ttl` is given.
  pub fn set_cached(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
    let ttl = ttl.unwrap_or_else(|| Duration::hours(1));
    self.set(&format!("{CACHE_PREFIX}{key}"), value, Some(ttl))
  }

  /// Read a response payload from the `cache_` region.
  pub fn get_cached(&self, key: &str) -> Option<Value> {
    self.get(&format!("{CACHE_PREFIX}{key}"))
  }

  /// Write one preference into the composite preference map.
  ///
  /// The map is read, modified, and written back whole, so two concurrent
  /// writers can lose one side's update. Preference writes are infrequent
  /// and last-writer-wins is the accepted contract.
  pub fn set_preference(&self, name: &str, value: Value) -> bool {
    let mut map = match self.get(PREFS_KEY) {
      Some(Value::Object(map)) => map,
      _ => serde_json::Map::new(),
    };
    map.insert(name.to_string(), value);
    self.set(PREFS_KEY, Value::Object(map), None)
  }

  /// Read one preference, or `default` when unset.
  pub fn get_preference(&self, name: &str, default: Value) -> Value {
    match self.get(PREFS_KEY) {
      Some(Value::Object(mut map)) => map.remove(name).unwrap_or(default),
      _ => default,
    }
  }

  /// Persist the bearer token. Never expires; cleared explicitly on logout
  /// or a 401.
  pub fn set_auth_token(&self, token: &str) -> bool {
    self.set(AUTH_TOKEN_KEY, Value::String(token.to_string()), None)
  }

  /// The stored bearer token, if any.
  pub fn auth_token(&self) -> Option<String> {
    match self.get(AUTH_TOKEN_KEY) {
      Some(Value::String(token)) => Some(token),
      _ => None,
    }
  }

  /// Drop the stored bearer token.
  pub fn clear_auth_token(&self) -> bool {
    self.remove(AUTH_TOKEN_KEY)
  }
}
