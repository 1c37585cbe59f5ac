//! Two-level cache facade over the in-process and durable tiers.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::memory::MemoryTier;
use super::storage::DurableStore;
use super::traits::{CacheEntry, CacheResult, CacheSource};
use crate::clock::{Clock, SystemClock};

/// Tuning for a [`TwoLevelCache`].
#[derive(Debug, Clone)]
pub struct CacheSettings {
  /// Key prefix in the durable store. Must not overlap another cache's.
  pub namespace: String,
  pub memory_ttl: Duration,
  pub durable_ttl: Duration,
  pub max_memory_entries: usize,
  pub sweep_interval: std::time::Duration,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      namespace: "person_search_".to_string(),
      memory_ttl: Duration::minutes(5),
      durable_ttl: Duration::hours(24),
      max_memory_entries: 100,
      sweep_interval: std::time::Duration::from_secs(60),
    }
  }
}

/// A fast, small, volatile tier in front of a slower, larger, durable one.
///
/// Reads check memory first and promote durable hits into memory. Writes go
/// to both tiers. Durable-store failures are logged and treated as misses.
pub struct TwoLevelCache<V> {
  memory: Arc<Mutex<MemoryTier<V>>>,
  durable: Arc<dyn DurableStore>,
  clock: Arc<dyn Clock>,
  settings: CacheSettings,
}

impl<V> TwoLevelCache<V>
where
  V: Clone + Serialize + DeserializeOwned + Send + 'static,
{
  pub fn new(durable: Arc<dyn DurableStore>, settings: CacheSettings) -> Self {
    Self::with_clock(durable, settings, Arc::new(SystemClock))
  }

  pub fn with_clock(
    durable: Arc<dyn DurableStore>,
    mut settings: CacheSettings,
    clock: Arc<dyn Clock>,
  ) -> Self {
    // The durable tier must outlive the memory tier.
    if settings.durable_ttl <= settings.memory_ttl {
      warn!(
        memory_ttl_secs = settings.memory_ttl.num_seconds(),
        durable_ttl_secs = settings.durable_ttl.num_seconds(),
        "durable TTL not longer than memory TTL, clamping memory TTL"
      );
      settings.memory_ttl = settings.durable_ttl / 2;
    }

    Self {
      memory: Arc::new(Mutex::new(MemoryTier::new(settings.max_memory_entries))),
      durable,
      clock,
      settings,
    }
  }

  pub fn settings(&self) -> &CacheSettings {
    &self.settings
  }

  fn memory(&self) -> MutexGuard<'_, MemoryTier<V>> {
    self.memory.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn durable_key(&self, key: &str) -> String {
    format!("{}{}", self.settings.namespace, key)
  }

  /// Look a key up in memory, then in the durable tier.
  pub fn get(&self, key: &str) -> Option<CacheResult<V>> {
    let now = self.clock.now();

    if let Some(entry) = self.memory().get(key, now) {
      return Some(CacheResult::from_tier(
        entry.value,
        CacheSource::Memory,
        entry.cached_at,
      ));
    }

    let entry = self.read_durable(key, now)?;

    // Promote, without outliving the durable copy.
    let remaining = entry.expires_at - now;
    let ttl = if remaining < self.settings.memory_ttl {
      remaining
    } else {
      self.settings.memory_ttl
    };
    self.memory().insert(key, entry.value.clone(), now, ttl);
    debug!(key, "promoted durable cache hit into memory");

    Some(CacheResult::from_tier(
      entry.value,
      CacheSource::Durable,
      entry.cached_at,
    ))
  }

  /// Write a value into both tiers.
  pub fn set(&self, key: &str, value: V) {
    let now = self.clock.now();
    self
      .memory()
      .insert(key, value.clone(), now, self.settings.memory_ttl);
    self.write_durable(key, value, now);
  }

  /// Whether a live entry exists in either tier.
  pub fn contains(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  /// Empty the memory tier and every durable key under this namespace.
  pub fn clear(&self) {
    self.memory().clear();

    let keys = match self.durable.keys_with_prefix(&self.settings.namespace) {
      Ok(keys) => keys,
      Err(e) => {
        warn!(error = %e, "failed to list durable cache keys");
        return;
      }
    };

    for key in keys {
      if let Err(e) = self.durable.remove(&key) {
        warn!(key = %key, error = %e, "failed to remove durable cache key");
      }
    }
  }

  /// Drop expired memory entries now. Returns the number removed.
  pub fn sweep_expired(&self) -> usize {
    let now = self.clock.now();
    self.memory().sweep_expired(now)
  }

  pub fn memory_len(&self) -> usize {
    self.memory().len()
  }

  /// Periodically sweep expired memory entries in the background.
  ///
  /// The task ends on its own once every handle to this cache is dropped.
  pub fn spawn_sweeper(&self, every: std::time::Duration) -> JoinHandle<()> {
    let memory = Arc::downgrade(&self.memory);
    let clock = Arc::clone(&self.clock);

    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      // First tick completes immediately
      ticker.tick().await;
      loop {
        ticker.tick().await;
        let Some(memory) = memory.upgrade() else {
          break;
        };
        let removed = memory
          .lock()
          .unwrap_or_else(PoisonError::into_inner)
          .sweep_expired(clock.now());
        if removed > 0 {
          debug!(removed, "swept expired memory cache entries");
        }
      }
    })
  }

  fn read_durable(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry<V>> {
    let durable_key = self.durable_key(key);

    let raw = match self.durable.get(&durable_key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!(key = %durable_key, error = %e, "durable cache read failed");
        return None;
      }
    };

    let entry: CacheEntry<V> = match serde_json::from_str(&raw) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(key = %durable_key, error = %e, "discarding corrupt durable cache entry");
        self.remove_durable(&durable_key);
        return None;
      }
    };

    if entry.is_expired(now) {
      self.remove_durable(&durable_key);
      return None;
    }

    Some(entry)
  }

  fn write_durable(&self, key: &str, value: V, now: DateTime<Utc>) {
    let durable_key = self.durable_key(key);
    let entry = CacheEntry::new(value, now, self.settings.durable_ttl);

    let raw = match serde_json::to_string(&entry) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key = %durable_key, error = %e, "failed to serialize durable cache entry");
        return;
      }
    };

    if let Err(e) = self.durable.set(&durable_key, &raw) {
      warn!(key = %durable_key, error = %e, "durable cache write failed");
    }
  }

  fn remove_durable(&self, durable_key: &str) {
    if let Err(e) = self.durable.remove(durable_key) {
      warn!(key = %durable_key, error = %e, "failed to remove durable cache key");
    }
  }
}

impl<V> Clone for TwoLevelCache<V> {
  fn clone(&self) -> Self {
    Self {
      memory: Arc::clone(&self.memory),
      durable: Arc::clone(&self.durable),
      clock: Arc::clone(&self.clock),
      settings: self.settings.clone(),
    }
  }
}
