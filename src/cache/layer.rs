//! Query cache: freshness, background revalidation, invalidation and persistence.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use super::invalidation::Mutation;
use super::key::{KeyPattern, QueryKey, QueryKind};
use super::storage::{CacheStorage, PersistedEntry, PersistedSnapshot};
use super::traits::CacheResult;
use crate::store::{DataStoreError, StoreResult};

struct Entry {
  data: Value,
  fetched_at: DateTime<Utc>,
  last_access: DateTime<Utc>,
  /// Set by a mutation; the next read waits for fresh data
  invalidated: bool,
  /// Message of the last failed refetch, cleared by a successful one
  last_error: Option<String>,
}

/// Fetches are stamped with the sequence number current when they start.
/// A result is kept only if nothing reaching its key was invalidated since.
#[derive(Default)]
struct State {
  entries: HashMap<QueryKey, Entry>,
  seq: u64,
  /// Results of fetches started before this are dropped
  epoch: u64,
  invalidated_at: HashMap<QueryKey, u64>,
  kind_invalidated_at: HashMap<QueryKind, u64>,
  /// Keys with a background refetch running, and the stamp it started with
  refetching: HashMap<QueryKey, u64>,
  pending: Vec<JoinHandle<()>>,
}

impl State {
  fn accepts(&self, key: &QueryKey, stamp: u64) -> bool {
    let after = |at: Option<&u64>| at.map_or(true, |&at| at <= stamp);
    stamp >= self.epoch
      && after(self.invalidated_at.get(key))
      && after(self.kind_invalidated_at.get(&key.kind()))
  }
}

/// Process-wide cache of query results keyed by `QueryKey`.
///
/// Reads inside the freshness window never reach the store. Reads past it
/// return the stale value and refetch in the background. Entries marked by
/// a mutation are refetched before the next read returns. Entries unused for
/// longer than the retention window are dropped.
pub struct QueryCache {
  state: Arc<Mutex<State>>,
  storage: Arc<dyn CacheStorage>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  /// How long an unused entry is retained
  gc_time: Duration,
  buster: String,
}

impl QueryCache {
  /// Create a new cache with the given snapshot storage backend.
  pub fn new(storage: impl CacheStorage + 'static) -> Self {
    Self {
      state: Arc::new(Mutex::new(State::default())),
      storage: Arc::new(storage),
      stale_time: Duration::minutes(5),
      gc_time: Duration::hours(24),
      buster: String::new(),
    }
  }

  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
    self.gc_time = gc_time;
    self
  }

  /// Tag persisted snapshots; a snapshot with another tag is ignored on hydrate.
  pub fn with_buster(mut self, buster: impl Into<String>) -> Self {
    self.buster = buster.into();
    self
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn is_stale(&self, fetched_at: DateTime<Utc>) -> bool {
    Utc::now() - fetched_at > self.stale_time
  }

  /// Load the persisted snapshot into memory. Returns the number of entries restored.
  pub fn hydrate(&self) -> usize {
    let snapshot = match self.storage.load() {
      Ok(Some(snapshot)) => snapshot,
      Ok(None) => return 0,
      Err(e) => {
        tracing::warn!("Ignoring unreadable cache snapshot: {}", e);
        return 0;
      }
    };

    let now = Utc::now();
    if snapshot.buster != self.buster || now - snapshot.saved_at > self.gc_time {
      tracing::debug!("Discarding outdated cache snapshot from {}", snapshot.saved_at);
      if let Err(e) = self.storage.clear() {
        tracing::warn!("Failed to discard cache snapshot: {}", e);
      }
      return 0;
    }

    let mut state = self.state();
    let mut restored = 0;
    for entry in snapshot.entries {
      if !entry.key.is_persisted() || now - entry.fetched_at > self.gc_time {
        continue;
      }
      state.entries.insert(
        entry.key,
        Entry {
          data: entry.data,
          fetched_at: entry.fetched_at,
          last_access: now,
          invalidated: false,
          last_error: None,
        },
      );
      restored += 1;
    }
    tracing::debug!("Restored {} cached queries", restored);
    restored
  }

  /// Read `key`, fetching through `fetcher` when there is nothing usable cached.
  ///
  /// 1. Fresh entry: returned as is
  /// 2. Stale entry: returned as is, refetch spawned in the background
  /// 3. Missing or invalidated entry: fetched now; errors propagate unchanged
  pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> StoreResult<CacheResult<T>>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = StoreResult<T>> + Send + 'static,
  {
    self.collect_garbage();

    let stamp = {
      let mut state = self.state();
      let stamp = state.seq;
      let cached = state.entries.get_mut(&key).and_then(|entry| {
        entry.last_access = Utc::now();
        if entry.invalidated {
          return None;
        }
        match serde_json::from_value::<T>(entry.data.clone()) {
          Ok(data) => Some((data, entry.fetched_at)),
          Err(e) => {
            tracing::warn!("Dropping undecodable cache entry {}: {}", key, e);
            None
          }
        }
      });

      if let Some((data, fetched_at)) = cached {
        if !self.is_stale(fetched_at) {
          tracing::debug!("Cache hit {}", key);
          return Ok(CacheResult::from_cache(data, fetched_at, false));
        }

        // Stale: serve what we have, revalidate in the background
        if !state.refetching.contains_key(&key) {
          tracing::debug!("Cache stale {}, revalidating", key);
          state.refetching.insert(key.clone(), stamp);
          let handle = self.spawn_refetch(key, stamp, fetcher());
          state.pending.retain(|h| !h.is_finished());
          state.pending.push(handle);
        }
        return Ok(CacheResult::from_cache(data, fetched_at, true));
      }
      stamp
    };

    tracing::debug!("Cache miss {}", key);
    match fetcher().await {
      Ok(data) => {
        let value = serde_json::to_value(&data).map_err(DataStoreError::from)?;
        let fetched_at = Utc::now();
        self.store_result(&key, value, fetched_at, stamp);
        Ok(CacheResult::from_network(data, fetched_at))
      }
      Err(e) => {
        self.record_failure(&key, &e);
        Err(e)
      }
    }
  }

  fn spawn_refetch<T, Fut>(&self, key: QueryKey, stamp: u64, future: Fut) -> JoinHandle<()>
  where
    T: Serialize + Send + 'static,
    Fut: Future<Output = StoreResult<T>> + Send + 'static,
  {
    let cache = self.clone();
    tokio::spawn(async move {
      let result = future.await;
      {
        let mut state = cache.state();
        if state.refetching.get(&key) == Some(&stamp) {
          state.refetching.remove(&key);
        }
      }
      match result.and_then(|data| serde_json::to_value(&data).map_err(DataStoreError::from)) {
        Ok(value) => cache.store_result(&key, value, Utc::now(), stamp),
        Err(e) => {
          tracing::warn!("Background refetch of {} failed: {}", key, e);
          cache.record_failure(&key, &e);
        }
      }
    })
  }

  /// Wait for every background refetch started so far, including ones they start.
  pub async fn settle(&self) {
    loop {
      let pending = std::mem::take(&mut self.state().pending);
      if pending.is_empty() {
        return;
      }
      for handle in pending {
        if let Err(e) = handle.await {
          tracing::warn!("Background refetch task failed: {}", e);
        }
      }
    }
  }

  /// Write a fetch result unless its key was invalidated or cleared since the fetch began.
  fn store_result(&self, key: &QueryKey, data: Value, fetched_at: DateTime<Utc>, stamp: u64) {
    {
      let mut state = self.state();
      if !state.accepts(key, stamp) {
        tracing::debug!("Discarding result for {} fetched before invalidation", key);
        return;
      }
      state.entries.insert(
        key.clone(),
        Entry {
          data,
          fetched_at,
          last_access: Utc::now(),
          invalidated: false,
          last_error: None,
        },
      );
    }
    if key.is_persisted() {
      self.persist();
    }
  }

  fn record_failure(&self, key: &QueryKey, error: &DataStoreError) {
    if let Some(entry) = self.state().entries.get_mut(key) {
      entry.last_error = Some(error.to_string());
    }
  }

  /// Entries whose last fetch failed, with the failure message.
  pub fn failures(&self) -> Vec<(QueryKey, String)> {
    let mut failures: Vec<_> = self
      .state()
      .entries
      .iter()
      .filter_map(|(key, entry)| Some((key.clone(), entry.last_error.clone()?)))
      .collect();
    failures.sort_by_key(|(key, _)| key.to_string());
    failures
  }

  /// Mark every entry matching `patterns` stale. Entries stay readable until refetched.
  pub fn invalidate(&self, patterns: &[KeyPattern]) -> usize {
    let marked = {
      let mut state = self.state();
      state.seq += 1;
      let seq = state.seq;
      for pattern in patterns {
        match pattern {
          KeyPattern::Exact(key) => {
            state.invalidated_at.insert(key.clone(), seq);
          }
          KeyPattern::Kind(kind) => {
            state.kind_invalidated_at.insert(*kind, seq);
          }
        }
      }

      let mut marked = 0;
      for (key, entry) in state.entries.iter_mut() {
        if patterns.iter().any(|p| p.matches(key)) {
          entry.invalidated = true;
          marked += 1;
        }
      }
      marked
    };

    self.persist();
    marked
  }

  /// Apply the invalidation rules of a completed mutation.
  pub fn invalidate_for(&self, mutation: &Mutation) -> usize {
    let marked = self.invalidate(&mutation.affected_keys());
    tracing::debug!("{:?} invalidated {} cached queries", mutation.kind(), marked);
    marked
  }

  /// Drop entries unused for longer than the retention window.
  pub fn collect_garbage(&self) -> usize {
    let now = Utc::now();
    let gc_time = self.gc_time;
    let mut state = self.state();
    let State {
      entries,
      epoch,
      invalidated_at,
      refetching,
      ..
    } = &mut *state;

    let before = entries.len();
    entries.retain(|_, e| now - e.last_access <= gc_time);

    // Forget invalidation stamps of evicted keys; raising the epoch past them
    // keeps results of fetches that started earlier from being accepted
    invalidated_at.retain(|key, at| {
      let keep = entries.contains_key(key) || refetching.contains_key(key);
      if !keep {
        *epoch = (*epoch).max(*at);
      }
      keep
    });
    before - entries.len()
  }

  /// Write the persistable, still-valid entries to storage.
  fn persist(&self) {
    let snapshot = {
      let state = self.state();
      PersistedSnapshot {
        buster: self.buster.clone(),
        saved_at: Utc::now(),
        entries: state
          .entries
          .iter()
          .filter(|(key, entry)| key.is_persisted() && !entry.invalidated)
          .map(|(key, entry)| PersistedEntry {
            key: key.clone(),
            data: entry.data.clone(),
            fetched_at: entry.fetched_at,
          })
          .collect(),
      }
    };

    if let Err(e) = self.storage.save(&snapshot) {
      tracing::warn!("Failed to persist query cache: {}", e);
    }
  }

  /// Forget everything, in memory and on disk. Fetches still in flight are discarded.
  pub fn clear(&self) -> color_eyre::Result<()> {
    {
      let mut state = self.state();
      state.seq += 1;
      state.epoch = state.seq;
      state.entries.clear();
      state.invalidated_at.clear();
      state.kind_invalidated_at.clear();
      state.refetching.clear();
    }
    self.storage.clear()
  }
}

impl Clone for QueryCache {
  fn clone(&self) -> Self {
    Self {
      state: Arc::clone(&self.state),
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
      gc_time: self.gc_time,
      buster: self.buster.clone(),
    }
  }
}
