//! Bounded in-process tier with insertion-order eviction.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use super::traits::CacheEntry;

/// Small, volatile tier of the two-level cache.
///
/// Eviction is by insertion order, not by access: when full, the entry
/// inserted earliest goes first. Overwriting a key keeps its original slot.
#[derive(Debug)]
pub struct MemoryTier<V> {
  entries: HashMap<String, CacheEntry<V>>,
  order: VecDeque<String>,
  max_entries: usize,
}

impl<V: Clone> MemoryTier<V> {
  pub fn new(max_entries: usize) -> Self {
    Self {
      entries: HashMap::new(),
      order: VecDeque::new(),
      max_entries: max_entries.max(1),
    }
  }

  /// Get a live entry. Expired entries are dropped on the way out.
  pub fn get(&mut self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry<V>> {
    let expired = match self.entries.get(key) {
      Some(entry) => entry.is_expired(now),
      None => return None,
    };

    if expired {
      self.remove(key);
      return None;
    }

    self.entries.get(key).cloned()
  }

  /// Insert a value, evicting the oldest insertion if at capacity.
  pub fn insert(&mut self, key: &str, value: V, now: DateTime<Utc>, ttl: Duration) {
    let entry = CacheEntry::new(value, now, ttl);
    self.insert_entry(key, entry);
  }

  /// Insert an already-built entry, keeping its timestamps.
  pub fn insert_entry(&mut self, key: &str, entry: CacheEntry<V>) {
    if let Some(existing) = self.entries.get_mut(key) {
      *existing = entry;
      return;
    }

    if self.entries.len() >= self.max_entries {
      if let Some(victim) = self.order.pop_front() {
        debug!(key = %victim, "evicting oldest memory cache entry");
        self.entries.remove(&victim);
      }
    }

    self.order.push_back(key.to_string());
    self.entries.insert(key.to_string(), entry);
  }

  pub fn remove(&mut self, key: &str) -> bool {
    if self.entries.remove(key).is_some() {
      self.order.retain(|k| k != key);
      true
    } else {
      false
    }
  }

  /// Drop every expired entry, returning how many were removed.
  pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
    let before = self.entries.len();
    self.entries.retain(|_, entry| !entry.is_expired(now));
    let entries = &self.entries;
    self.order.retain(|k| entries.contains_key(k));
    before - self.entries.len()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.order.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_evicts_earliest_insert_only() {
    let now = Utc::now();
    let ttl = Duration::minutes(5);
    let mut tier = MemoryTier::new(3);
    tier.insert("a", 1, now, ttl);
    tier.insert("b", 2, now, ttl);
    tier.insert("c", 3, now, ttl);

    tier.insert("d", 4, now, ttl);

    assert_eq!(tier.len(), 3);
    assert!(!tier.contains("a"));
    assert!(tier.contains("b"));
    assert!(tier.contains("c"));
    assert!(tier.contains("d"));
  }

  #[test]
  fn test_reads_do_not_refresh_eviction_order() {
    let now = Utc::now();
    let ttl = Duration::minutes(5);
    let mut tier = MemoryTier::new(2);
    tier.insert("a", 1, now, ttl);
    tier.insert("b", 2, now, ttl);

    assert!(tier.get("a", now).is_some());
    tier.insert("c", 3, now, ttl);

    assert!(!tier.contains("a"));
    assert!(tier.contains("b"));
  }

  #[test]
  fn test_overwrite_keeps_slot_and_size() {
    let now = Utc::now();
    let ttl = Duration::minutes(5);
    let mut tier = MemoryTier::new(2);
    tier.insert("a", 1, now, ttl);
    tier.insert("b", 2, now, ttl);
    tier.insert("a", 10, now, ttl);

    assert_eq!(tier.len(), 2);
    assert_eq!(tier.get("a", now).map(|e| e.value), Some(10));

    tier.insert("c", 3, now, ttl);
    assert!(!tier.contains("a"));
  }

  #[test]
  fn test_expired_entry_is_not_returned() {
    let now = Utc::now();
    let mut tier = MemoryTier::new(4);
    tier.insert("a", 1, now, Duration::seconds(30));

    assert!(tier.get("a", now + Duration::seconds(31)).is_none());
    assert!(tier.is_empty());
  }

  #[test]
  fn test_sweep_removes_only_expired() {
    let now = Utc::now();
    let mut tier = MemoryTier::new(4);
    tier.insert("short", 1, now, Duration::seconds(10));
    tier.insert("long", 2, now, Duration::minutes(10));

    let removed = tier.sweep_expired(now + Duration::minutes(1));

    assert_eq!(removed, 1);
    assert!(tier.contains("long"));
    assert!(!tier.contains("short"));
  }
}
