//! Core types for the caching system.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A cached value with its bookkeeping timestamps.
///
/// `expires_at` is always strictly after `cached_at`. Entries past
/// `expires_at` are never handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
  pub value: V,
  pub cached_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
  /// Create an entry that lives for `ttl` starting at `now`.
  pub fn new(value: V, now: DateTime<Utc>, ttl: Duration) -> Self {
    let ttl = if ttl <= Duration::zero() {
      Duration::milliseconds(1)
    } else {
      ttl
    };
    Self {
      value,
      cached_at: now,
      expires_at: now + ttl,
    }
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    now >= self.expires_at
  }
}

/// Result from a cache-aware lookup, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from one of the cache tiers.
  pub fn from_tier(data: T, source: CacheSource, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source,
      cached_at: Some(cached_at),
    }
  }

  /// Whether this value was served without a remote call.
  pub fn from_cache(&self) -> bool {
    !matches!(self.source, CacheSource::Network)
  }

  /// One-line description of where the value came from.
  pub fn provenance(&self) -> String {
    match self.cached_at {
      Some(at) => format!("source: {}, cached at {}", self.source, at.to_rfc3339()),
      None => format!("source: {}", self.source),
    }
  }
}

/// Indicates where a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the remote directory
  Network,
  /// In-process tier
  Memory,
  /// Durable tier (promoted into memory on read)
  Durable,
}

impl std::fmt::Display for CacheSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      CacheSource::Network => "network",
      CacheSource::Memory => "memory",
      CacheSource::Durable => "durable",
    };
    f.write_str(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_entry_expiry_boundary() {
    let now = Utc::now();
    let entry = CacheEntry::new("x", now, Duration::seconds(10));
    assert!(!entry.is_expired(now + Duration::seconds(9)));
    assert!(entry.is_expired(now + Duration::seconds(10)));
  }

  #[test]
  fn test_zero_ttl_still_orders_timestamps() {
    let now = Utc::now();
    let entry = CacheEntry::new(1, now, Duration::zero());
    assert!(entry.expires_at > entry.cached_at);
  }

  #[test]
  fn test_from_cache_flag() {
    let now = Utc::now();
    assert!(!CacheResult::from_network(1).from_cache());
    assert!(CacheResult::from_tier(1, CacheSource::Durable, now).from_cache());
  }

  #[test]
  fn test_provenance_with_and_without_timestamp() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();

    assert_eq!(CacheResult::from_network(1).provenance(), "source: network");
    assert_eq!(
      CacheResult::from_tier(1, CacheSource::Memory, at).provenance(),
      "source: memory, cached at 2024-03-01T08:30:00+00:00"
    );
  }
}
