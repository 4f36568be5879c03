//! Stored-value envelope with optional expiration.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored value together with its lifetime metadata.
///
/// Entries are created on `set`, read on `get`, and evicted lazily when a
/// read observes them past their deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
  /// The cached payload
  pub value: Value,
  /// When the entry was written
  pub stored_at: DateTime<Utc>,
  /// Expiry deadline; `None` means the entry never expires
  pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
  /// Build an entry stamped with the current time. A `ttl` of `None`
  /// produces an entry that never expires.
  pub fn new(value: Value, ttl: Option<Duration>) -> Self {
    let now = Utc::now();
    Self {
      value,
      stored_at: now,
      expires_at: ttl.map(|ttl| now + ttl),
    }
  }

  /// Whether the entry is past its deadline at the given instant.
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    match self.expires_at {
      Some(deadline) => now > deadline,
      None => false,
    }
  }

  /// Whether the entry is past its deadline right now.
  pub fn is_expired(&self) -> bool {
    self.is_expired_at(Utc::now())
  }
}
