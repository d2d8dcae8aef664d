//! Cached workout client that wraps WorkoutApi with transparent caching.

use chrono::Duration;
use color_eyre::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cache::{
  CacheResult, CacheStorage, Mutation, NoopStorage, QueryCache, QueryKey, SqliteStorage,
};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::AppResult;
use crate::store::{RestStore, StoreResult};

use super::api::{Direction, WorkoutApi};
use super::types::{
  DailyLog, Exercise, ExerciseDraft, ExercisePatch, LastSession, PerformedSet, Routine,
};

/// Workout client with transparent caching support.
///
/// Reads go through the query cache; every successful write marks the
/// queries it changed as stale. Failed writes leave the cache untouched.
#[derive(Clone)]
pub struct CachedWorkoutClient {
  inner: WorkoutApi,
  cache: QueryCache,
}

impl CachedWorkoutClient {
  pub fn new(inner: WorkoutApi, cache: QueryCache) -> Self {
    Self { inner, cache }
  }

  /// Build the production client: REST store, system clock and the on-disk cache.
  pub fn from_config(config: &Config) -> Result<Self> {
    let store = RestStore::new(config)?;
    let inner = WorkoutApi::new(Arc::new(store), Arc::new(SystemClock));

    let storage: Box<dyn CacheStorage> = if config.cache.enabled {
      let path = Config::data_dir()?.join("cache.db");
      Box::new(SqliteStorage::open(&path)?)
    } else {
      Box::new(NoopStorage)
    };
    let cache = QueryCache::new(storage)
      .with_stale_time(Duration::minutes(config.cache.stale_minutes))
      .with_gc_time(Duration::hours(config.cache.gc_hours))
      .with_buster(cache_buster(&config.store.url));
    cache.hydrate();

    Ok(Self { inner, cache })
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  pub fn today(&self) -> chrono::NaiveDate {
    self.inner.today()
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  pub async fn get_routines(&self) -> StoreResult<Vec<Routine>> {
    Ok(self.get_routines_cached().await?.data)
  }

  /// Routine list along with where it came from and when it was fetched.
  pub async fn get_routines_cached(&self) -> StoreResult<CacheResult<Vec<Routine>>> {
    let inner = self.inner.clone();
    self
      .cache
      .fetch(QueryKey::Routines, || async move { inner.get_routines().await })
      .await
  }

  pub async fn get_exercises(&self, routine_id: &str) -> StoreResult<Vec<Exercise>> {
    let result = self
      .cache
      .fetch(QueryKey::exercises(routine_id), || {
        let inner = self.inner.clone();
        let routine_id = routine_id.to_string();
        async move { inner.get_exercises(&routine_id).await }
      })
      .await?;
    Ok(result.data)
  }

  pub async fn get_today_log(&self, routine_id: &str) -> StoreResult<Option<DailyLog>> {
    let result = self
      .cache
      .fetch(QueryKey::today_log(routine_id), || {
        let inner = self.inner.clone();
        let routine_id = routine_id.to_string();
        async move { inner.get_today_log(&routine_id).await }
      })
      .await?;
    Ok(result.data)
  }

  pub async fn get_done_exercise_ids(&self, daily_log_id: &str) -> StoreResult<BTreeSet<String>> {
    let result = self
      .cache
      .fetch(QueryKey::done_exercise_ids(daily_log_id), || {
        let inner = self.inner.clone();
        let daily_log_id = daily_log_id.to_string();
        async move { inner.get_done_exercise_ids(&daily_log_id).await }
      })
      .await?;
    Ok(result.data)
  }

  pub async fn get_last_session(
    &self,
    routine_id: &str,
    include_today: bool,
  ) -> StoreResult<Option<LastSession>> {
    let result = self
      .cache
      .fetch(QueryKey::last_session(routine_id, include_today), || {
        let inner = self.inner.clone();
        let routine_id = routine_id.to_string();
        async move { inner.get_last_session(&routine_id, include_today).await }
      })
      .await?;
    Ok(result.data)
  }

  // ==========================================================================
  // Writes (not cached - invalidate on success)
  // ==========================================================================

  pub async fn create_routine(&self, name: &str, exercises: &[ExerciseDraft]) -> AppResult<Routine> {
    let routine = self.inner.create_routine(name, exercises).await?;
    self.cache.invalidate_for(&Mutation::CreateRoutine);
    Ok(routine)
  }

  pub async fn update_routine(&self, id: &str, name: &str) -> AppResult<()> {
    self.inner.update_routine(id, name).await?;
    self.cache.invalidate_for(&Mutation::UpdateRoutine {
      routine_id: id.to_string(),
    });
    Ok(())
  }

  pub async fn delete_routine(&self, id: &str) -> StoreResult<()> {
    self.inner.delete_routine(id).await?;
    self.cache.invalidate_for(&Mutation::DeleteRoutine {
      routine_id: id.to_string(),
    });
    Ok(())
  }

  pub async fn add_exercise(&self, routine_id: &str, draft: &ExerciseDraft) -> StoreResult<Exercise> {
    let exercise = self.inner.add_exercise(routine_id, draft).await?;
    self.cache.invalidate_for(&Mutation::CreateExercise {
      routine_id: routine_id.to_string(),
    });
    Ok(exercise)
  }

  pub async fn update_exercise(
    &self,
    routine_id: &str,
    id: &str,
    patch: &ExercisePatch,
  ) -> StoreResult<()> {
    self.inner.update_exercise(id, patch).await?;
    self.cache.invalidate_for(&Mutation::UpdateExercise {
      routine_id: routine_id.to_string(),
    });
    Ok(())
  }

  pub async fn delete_exercise(&self, routine_id: &str, id: &str) -> StoreResult<()> {
    self.inner.delete_exercise(routine_id, id).await?;
    self.cache.invalidate_for(&Mutation::DeleteExercise {
      routine_id: routine_id.to_string(),
    });
    Ok(())
  }

  pub async fn move_exercise(
    &self,
    routine_id: &str,
    id: &str,
    direction: Direction,
  ) -> AppResult<bool> {
    let moved = self.inner.move_exercise(routine_id, id, direction).await?;
    if moved {
      self.cache.invalidate_for(&Mutation::ReorderExercises {
        routine_id: routine_id.to_string(),
      });
    }
    Ok(moved)
  }

  /// Save one exercise's sets for today. Returns the daily log written to.
  pub async fn save_exercise_sets(
    &self,
    routine_id: &str,
    exercise_id: &str,
    sets: &[PerformedSet],
  ) -> StoreResult<DailyLog> {
    let log = self
      .inner
      .save_exercise_sets(routine_id, exercise_id, sets)
      .await?;
    self.cache.invalidate_for(&Mutation::SaveSetLog {
      routine_id: routine_id.to_string(),
      daily_log_id: Some(log.id.clone()),
    });
    Ok(log)
  }
}

/// Snapshot tag: changes with the crate version and with the store it was fetched from.
fn cache_buster(store_url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
  hasher.update(b"\0");
  hasher.update(store_url.as_bytes());
  hex::encode(&hasher.finalize()[..8])
}
