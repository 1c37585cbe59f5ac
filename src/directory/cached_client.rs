//! Directory search with transparent two-level caching.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheResult, TwoLevelCache};

use super::client::Directory;
use super::error::{classify, SearchError};
use super::types::{DirectoryEntry, ResultKind};

/// Shortest trimmed query sent to the directory.
pub const MIN_QUERY_CHARS: usize = 2;

/// Directory client with transparent caching.
///
/// Searches always go to the directory, and every result they return is
/// written into both cache tiers so later id lookups are served locally.
/// Id lookups go memory -> durable -> directory. Entries are keyed by kind
/// and id; a bare id lookup prefers a person over a group.
pub struct PersonSearch<D> {
  directory: Arc<D>,
  cache: TwoLevelCache<DirectoryEntry>,
}

impl<D: Directory> PersonSearch<D> {
  pub fn new(directory: D, cache: TwoLevelCache<DirectoryEntry>) -> Self {
    Self {
      directory: Arc::new(directory),
      cache,
    }
  }

  /// Search the directory by free text.
  pub async fn search(
    &self,
    query: &str,
    limit: usize,
    types: &[ResultKind],
  ) -> Result<Vec<CacheResult<DirectoryEntry>>, SearchError> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
      return Err(SearchError::invalid_query(format!(
        "Search query must be at least {} characters",
        MIN_QUERY_CHARS
      )));
    }

    let raw = self
      .directory
      .search(query, limit, types)
      .await
      .map_err(|e| classify(&e))?;

    let mut seen = HashSet::new();
    let entries: Vec<DirectoryEntry> = raw
      .into_iter()
      .map(|r| r.into_entry())
      .filter(|entry| seen.insert(entry.dedupe_key()))
      .collect();

    for entry in &entries {
      self.cache.set(&entry.cache_key(), entry.clone());
    }

    info!(query, results = entries.len(), "directory search");

    Ok(entries.into_iter().map(CacheResult::from_network).collect())
  }

  /// Fetch a single entry by id, preferring cached copies.
  pub async fn get_by_id(&self, id: &str) -> Result<CacheResult<DirectoryEntry>, SearchError> {
    let id = id.trim();
    if id.is_empty() {
      return Err(SearchError::invalid_query("Id must not be empty"));
    }

    let cached = ResultKind::LOOKUP_ORDER
      .iter()
      .find_map(|kind| self.cache.get(&DirectoryEntry::key_for(*kind, id)));
    if let Some(hit) = cached {
      debug!(id, source = ?hit.source, "directory cache hit");
      return Ok(hit);
    }

    let raw = self
      .directory
      .get_by_id(id)
      .await
      .map_err(|e| classify(&e))?;

    let mut entry = raw.into_entry();
    // The record was asked for by this id, keep it addressable that way
    if entry.id.is_none() {
      entry.id = Some(id.to_string());
    }

    self.cache.set(&DirectoryEntry::key_for(entry.kind, id), entry.clone());
    Ok(CacheResult::from_network(entry))
  }

  /// Drop every cached entry owned by this client. Never fails.
  pub fn clear_cache(&self) {
    self.cache.clear();
    info!("directory cache cleared");
  }

  /// Prefetch ids concurrently. Individual failures are discarded.
  ///
  /// Returns how many of the ids resolved.
  pub async fn warm_cache(&self, ids: &[String]) -> usize {
    let results = join_all(ids.iter().map(|id| self.get_by_id(id))).await;

    let mut warmed = 0;
    for (id, result) in ids.iter().zip(results) {
      match result {
        Ok(_) => warmed += 1,
        Err(e) => debug!(id = %id, code = ?e.code, "skipping id while warming cache"),
      }
    }
    warmed
  }

  /// Start the periodic sweep of expired in-process entries.
  pub fn spawn_sweeper(&self) -> JoinHandle<()> {
    let every = self.cache.settings().sweep_interval;
    self.cache.spawn_sweeper(every)
  }
}

impl<D> Clone for PersonSearch<D> {
  fn clone(&self) -> Self {
    Self {
      directory: Arc::clone(&self.directory),
      cache: self.cache.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSettings, CacheSource, DurableStore, MemoryStore};
  use crate::clock::ManualClock;
  use crate::directory::error::{DirectoryError, SearchErrorCode};
  use crate::directory::types::RawDirectoryRecord;
  use chrono::{Duration, Utc};
  use serde_json::json;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Default)]
  struct FakeDirectory {
    records: HashMap<String, RawDirectoryRecord>,
    search_results: Vec<RawDirectoryRecord>,
    failing: HashSet<String>,
    search_error: Option<DirectoryError>,
    search_calls: AtomicUsize,
    get_calls: AtomicUsize,
  }

  impl FakeDirectory {
    fn with_people(ids: &[&str]) -> Self {
      let records = ids
        .iter()
        .map(|id| {
          let raw: RawDirectoryRecord =
            serde_json::from_value(json!({"id": id, "type": "person", "firstName": "P", "lastName": id}))
              .unwrap();
          (id.to_string(), raw)
        })
        .collect();
      Self {
        records,
        ..Self::default()
      }
    }
  }

  impl Directory for FakeDirectory {
    async fn search(
      &self,
      _text: &str,
      _limit: usize,
      _types: &[ResultKind],
    ) -> Result<Vec<RawDirectoryRecord>, DirectoryError> {
      self.search_calls.fetch_add(1, Ordering::SeqCst);
      match &self.search_error {
        Some(e) => Err(e.clone()),
        None => Ok(self.search_results.clone()),
      }
    }

    async fn get_by_id(&self, id: &str) -> Result<RawDirectoryRecord, DirectoryError> {
      self.get_calls.fetch_add(1, Ordering::SeqCst);
      if self.failing.contains(id) {
        return Err(DirectoryError::Transport("connection refused".to_string()));
      }
      self
        .records
        .get(id)
        .cloned()
        .ok_or_else(|| DirectoryError::Status {
          status: 404,
          message: "not found".to_string(),
        })
    }
  }

  fn client(directory: FakeDirectory) -> (PersonSearch<FakeDirectory>, Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache = TwoLevelCache::with_clock(store.clone(), CacheSettings::default(), clock.clone());
    (PersonSearch::new(directory, cache), store, clock)
  }

  #[tokio::test]
  async fn test_short_query_is_rejected_without_remote_call() {
    let (search, _, _) = client(FakeDirectory::default());

    for query in ["", "a", "  b  ", " "] {
      let err = search.search(query, 10, &[]).await.unwrap_err();
      assert_eq!(err.code, SearchErrorCode::InvalidQuery);
    }
    assert_eq!(search.directory.search_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_search_dedupes_and_caches_results() {
    let results: Vec<RawDirectoryRecord> = serde_json::from_value(json!([
      {"id": 1, "type": "person", "displayName": "Ann"},
      {"id": 1, "type": "person", "displayName": "Ann (dup)"},
      {"id": 1, "type": "group", "name": "Ushers"},
      {"type": "group", "name": "Choir"},
      {"type": "group", "title": "Choir"}
    ]))
    .unwrap();
    let (search, store, _) = client(FakeDirectory {
      search_results: results,
      ..FakeDirectory::default()
    });

    let hits = search.search(" an ", 10, &[]).await.unwrap();

    let names: Vec<&str> = hits.iter().map(|h| h.data.display_name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "Ushers", "Choir"]);
    assert!(hits.iter().all(|h| !h.from_cache()));
    assert!(store.get("person_search_group:Choir").unwrap().is_some());

    // Search results make later id lookups local
    let hit = search.get_by_id("1").await.unwrap();
    assert!(hit.from_cache());
    assert_eq!(search.directory.get_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_person_and_group_sharing_an_id_are_both_kept() {
    let results: Vec<RawDirectoryRecord> = serde_json::from_value(json!([
      {"id": 1, "type": "group", "name": "Ushers"},
      {"id": 1, "type": "person", "displayName": "Ann"}
    ]))
    .unwrap();
    let (search, store, _) = client(FakeDirectory {
      search_results: results,
      ..FakeDirectory::default()
    });

    search.search("ann", 10, &[]).await.unwrap();

    assert!(store.get("person_search_person:1").unwrap().is_some());
    assert!(store.get("person_search_group:1").unwrap().is_some());

    let hit = search.get_by_id("1").await.unwrap();
    assert!(hit.from_cache());
    assert_eq!(hit.data.kind, ResultKind::Person);
    assert_eq!(hit.data.display_name, "Ann");
    assert_eq!(search.directory.get_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_fetched_entry_is_keyed_by_kind() {
    let group: RawDirectoryRecord =
      serde_json::from_value(json!({"id": 1, "type": "group", "name": "Ushers"})).unwrap();
    let (search, store, _) = client(FakeDirectory {
      records: HashMap::from([("1".to_string(), group)]),
      ..FakeDirectory::default()
    });

    let hit = search.get_by_id("1").await.unwrap();
    assert_eq!(hit.data.kind, ResultKind::Group);
    assert!(store.get("person_search_group:1").unwrap().is_some());
    assert!(store.get("person_search_1").unwrap().is_none());
  }

  #[tokio::test]
  async fn test_second_get_within_ttl_is_cached() {
    let (search, _, clock) = client(FakeDirectory::with_people(&["7"]));

    let first = search.get_by_id("7").await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(first.data.display_name, "P 7");

    clock.advance(Duration::minutes(1));
    let second = search.get_by_id("7").await.unwrap();
    assert_eq!(second.source, CacheSource::Memory);
    assert_eq!(search.directory.get_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_durable_tier_survives_new_client() {
    let store = Arc::new(MemoryStore::new());
    let settings = CacheSettings::default();

    let first = PersonSearch::new(
      FakeDirectory::with_people(&["7"]),
      TwoLevelCache::new(store.clone(), settings.clone()),
    );
    first.get_by_id("7").await.unwrap();

    let second = PersonSearch::new(
      FakeDirectory::with_people(&["7"]),
      TwoLevelCache::new(store.clone(), settings),
    );
    let hit = second.get_by_id("7").await.unwrap();
    assert_eq!(hit.source, CacheSource::Durable);
    assert_eq!(second.directory.get_calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_clear_forces_one_refetch() {
    let (search, _, _) = client(FakeDirectory::with_people(&["7"]));
    search.get_by_id("7").await.unwrap();

    search.clear_cache();
    search.get_by_id("7").await.unwrap();
    search.get_by_id("7").await.unwrap();

    assert_eq!(search.directory.get_calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_warm_cache_survives_failing_id() {
    let mut directory = FakeDirectory::with_people(&["1", "2"]);
    directory.failing.insert("1".to_string());
    let (search, _, _) = client(directory);

    let warmed = search.warm_cache(&["1".to_string(), "2".to_string()]).await;
    assert_eq!(warmed, 1);

    let hit = search.get_by_id("2").await.unwrap();
    assert!(hit.from_cache());
  }

  #[tokio::test]
  async fn test_search_errors_are_classified() {
    let (search, _, _) = client(FakeDirectory {
      search_error: Some(DirectoryError::Status {
        status: 401,
        message: "token expired".to_string(),
      }),
      ..FakeDirectory::default()
    });

    let err = search.search("ann", 10, &[]).await.unwrap_err();
    assert_eq!(err.code, SearchErrorCode::Unauthorized);
    assert_eq!(err.details.unwrap()["status"], 401);
  }

  #[tokio::test]
  async fn test_missing_id_is_search_failed() {
    let (search, _, _) = client(FakeDirectory::default());
    let err = search.get_by_id("nope").await.unwrap_err();
    assert_eq!(err.code, SearchErrorCode::SearchFailed);
  }
}
