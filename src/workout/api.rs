//! Typed operations over the workout collections.

use futures::future::try_join_all;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::store::{self, DataStore, Record, Select, StoreResult};

use super::types::{
  DailyLog, Exercise, ExerciseDraft, ExercisePatch, LastSession, NewDailyLog, NewExercise,
  NewRoutine, NewSetLog, PerformedSet, Routine, SetLog,
};
use super::validate::{self, ValidationError};

/// Direction for moving an exercise within its routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Up,
  Down,
}

#[derive(Deserialize)]
struct ExerciseRef {
  exercise_id: String,
}

/// Workout operations against the remote data store.
#[derive(Clone)]
pub struct WorkoutApi {
  store: Arc<dyn DataStore>,
  clock: Arc<dyn Clock>,
}

impl WorkoutApi {
  pub fn new(store: Arc<dyn DataStore>, clock: Arc<dyn Clock>) -> Self {
    Self { store, clock }
  }

  pub fn today(&self) -> chrono::NaiveDate {
    self.clock.today()
  }

  fn store(&self) -> &dyn DataStore {
    self.store.as_ref()
  }

  // ==========================================================================
  // Routines
  // ==========================================================================

  pub async fn get_routines(&self) -> StoreResult<Vec<Routine>> {
    store::list(self.store(), &Select::new().order_by("name", true)).await
  }

  /// Create a routine together with its initial exercises (ordered as given).
  pub async fn create_routine(&self, name: &str, exercises: &[ExerciseDraft]) -> AppResult<Routine> {
    let name = validate::required("routine name", name)?;
    if exercises.is_empty() {
      return Err(ValidationError::NoExercises.into());
    }

    let routine: Routine = store::insert_one(self.store(), &NewRoutine { name: &name }).await?;
    try_join_all(
      exercises
        .iter()
        .enumerate()
        .map(|(i, draft)| self.create_exercise(&routine.id, draft, i as i64)),
    )
    .await?;

    tracing::info!("Created routine {} with {} exercises", routine.id, exercises.len());
    Ok(routine)
  }

  pub async fn update_routine(&self, id: &str, name: &str) -> AppResult<()> {
    let name = validate::required("routine name", name)?;
    store::update_by_id(self.store(), Routine::TABLE, id, &NewRoutine { name: &name }).await?;
    Ok(())
  }

  /// Delete a routine; its exercises and logs go with it by store-side cascade.
  pub async fn delete_routine(&self, id: &str) -> StoreResult<()> {
    store::delete_by_id(self.store(), Routine::TABLE, id).await
  }

  // ==========================================================================
  // Exercises
  // ==========================================================================

  pub async fn get_exercises(&self, routine_id: &str) -> StoreResult<Vec<Exercise>> {
    let query = Select::new()
      .eq("routine_id", routine_id)
      .order_by("order_index", true);
    store::list(self.store(), &query).await
  }

  pub async fn create_exercise(
    &self,
    routine_id: &str,
    draft: &ExerciseDraft,
    order_index: i64,
  ) -> StoreResult<Exercise> {
    let row = NewExercise {
      routine_id,
      name: &draft.name,
      sets: draft.sets,
      rep_range: &draft.rep_range,
      order_index,
    };
    store::insert_one(self.store(), &row).await
  }

  /// Append an exercise after the routine's current last one.
  pub async fn add_exercise(&self, routine_id: &str, draft: &ExerciseDraft) -> StoreResult<Exercise> {
    let next_index = self
      .get_exercises(routine_id)
      .await?
      .last()
      .map(|e| e.order_index + 1)
      .unwrap_or(0);
    self.create_exercise(routine_id, draft, next_index).await
  }

  pub async fn update_exercise(&self, id: &str, patch: &ExercisePatch) -> StoreResult<()> {
    if patch.is_empty() {
      return Ok(());
    }
    store::update_by_id(self.store(), Exercise::TABLE, id, patch).await
  }

  /// Delete an exercise and close the gap it leaves in the order indices.
  pub async fn delete_exercise(&self, routine_id: &str, id: &str) -> StoreResult<()> {
    store::delete_by_id(self.store(), Exercise::TABLE, id).await?;
    self.reindex(routine_id).await
  }

  /// Swap an exercise with its neighbour. Returns false at either end of the list.
  pub async fn move_exercise(
    &self,
    routine_id: &str,
    id: &str,
    direction: Direction,
  ) -> AppResult<bool> {
    let exercises = self.get_exercises(routine_id).await?;
    let pos = exercises
      .iter()
      .position(|e| e.id == id)
      .ok_or_else(|| AppError::not_found("exercise", id))?;
    let other = match direction {
      Direction::Up if pos > 0 => pos - 1,
      Direction::Down if pos + 1 < exercises.len() => pos + 1,
      _ => return Ok(false),
    };

    let (a, b) = (&exercises[pos], &exercises[other]);
    // Park one row outside the index range so no two rows share an index mid-swap.
    self.set_order_index(&a.id, -1).await?;
    self.set_order_index(&b.id, a.order_index).await?;
    self.set_order_index(&a.id, b.order_index).await?;
    Ok(true)
  }

  async fn set_order_index(&self, id: &str, order_index: i64) -> StoreResult<()> {
    let patch = serde_json::json!({ "order_index": order_index });
    store::update_by_id(self.store(), Exercise::TABLE, id, &patch).await
  }

  /// Renumber a routine's exercises 0..n keeping their relative order.
  async fn reindex(&self, routine_id: &str) -> StoreResult<()> {
    for (i, exercise) in self.get_exercises(routine_id).await?.iter().enumerate() {
      if exercise.order_index != i as i64 {
        self.set_order_index(&exercise.id, i as i64).await?;
      }
    }
    Ok(())
  }

  // ==========================================================================
  // Daily logs
  // ==========================================================================

  /// Today's log for a routine, if one exists yet.
  pub async fn get_today_log(&self, routine_id: &str) -> StoreResult<Option<DailyLog>> {
    let query = Select::new()
      .eq("routine_id", routine_id)
      .eq("date", self.today());
    store::get_one_or_none(self.store(), &query).await
  }

  /// Today's log for a routine, created on first use.
  ///
  /// The store enforces one log per (routine, date); losing an insert race
  /// to another client surfaces as a unique violation and the winner's row
  /// is read back instead.
  pub async fn get_or_create_today_log(&self, routine_id: &str) -> StoreResult<DailyLog> {
    if let Some(existing) = self.get_today_log(routine_id).await? {
      return Ok(existing);
    }

    let row = NewDailyLog {
      routine_id,
      date: self.today(),
    };
    match store::insert_one::<DailyLog, _>(self.store(), &row).await {
      Ok(created) => {
        tracing::info!("Started daily log {} for routine {}", created.id, routine_id);
        Ok(created)
      }
      Err(e) if e.is_unique_violation() => {
        tracing::debug!("Daily log for routine {} already exists, re-reading", routine_id);
        self.get_today_log(routine_id).await?.ok_or(e)
      }
      Err(e) => Err(e),
    }
  }

  // ==========================================================================
  // Set logs
  // ==========================================================================

  pub async fn get_set_logs(&self, daily_log_id: &str) -> StoreResult<Vec<SetLog>> {
    let query = Select::new()
      .eq("daily_log_id", daily_log_id)
      .order_by("set_number", true);
    store::list(self.store(), &query).await
  }

  /// Ids of exercises with at least one set recorded in a daily log.
  pub async fn get_done_exercise_ids(&self, daily_log_id: &str) -> StoreResult<BTreeSet<String>> {
    let query = Select::new()
      .columns("exercise_id")
      .eq("daily_log_id", daily_log_id);
    let rows: Vec<ExerciseRef> = store::list_table(self.store(), SetLog::TABLE, &query).await?;
    Ok(rows.into_iter().map(|r| r.exercise_id).collect())
  }

  /// Most recent daily log of a routine with its per-exercise sets.
  ///
  /// With `include_today = false` only logs dated strictly before today
  /// match, so a routine whose only log is today's yields `None`.
  pub async fn get_last_session(
    &self,
    routine_id: &str,
    include_today: bool,
  ) -> StoreResult<Option<LastSession>> {
    let mut query = Select::new().eq("routine_id", routine_id);
    if !include_today {
      query = query.lt("date", self.today());
    }
    let query = query.order_by("date", false).limit(1);

    let Some(log) = store::list::<DailyLog>(self.store(), &query)
      .await?
      .into_iter()
      .next()
    else {
      return Ok(None);
    };

    let mut exercises: BTreeMap<String, Vec<PerformedSet>> = BTreeMap::new();
    for set in self.get_set_logs(&log.id).await? {
      exercises.entry(set.exercise_id).or_default().push(PerformedSet {
        reps: set.reps,
        weight: set.weight,
      });
    }

    Ok(Some(LastSession {
      daily_log_id: log.id,
      date: log.date,
      exercises,
    }))
  }

  /// Record one exercise's sets for today, replacing any saved earlier today.
  ///
  /// Returns the daily log the sets were written to.
  pub async fn save_exercise_sets(
    &self,
    routine_id: &str,
    exercise_id: &str,
    sets: &[PerformedSet],
  ) -> StoreResult<DailyLog> {
    let log = self.get_or_create_today_log(routine_id).await?;

    let scope = [
      store::Filter::eq("daily_log_id", &log.id),
      store::Filter::eq("exercise_id", exercise_id),
    ];
    self.store().delete(SetLog::TABLE, &scope).await?;

    let rows: Vec<NewSetLog> = sets
      .iter()
      .enumerate()
      .map(|(i, set)| NewSetLog {
        daily_log_id: &log.id,
        exercise_id,
        set_number: i as u32 + 1,
        reps: set.reps,
        weight: set.weight,
      })
      .collect();
    store::insert_many(self.store(), SetLog::TABLE, &rows).await?;

    tracing::info!(
      "Saved {} sets of exercise {} to daily log {}",
      rows.len(),
      exercise_id,
      log.id
    );
    Ok(log)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::clock::FixedClock;
  use crate::store::memory::MemoryStore;
  use chrono::NaiveDate;

  pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
  }

  pub fn api_on(store: Arc<MemoryStore>, today: NaiveDate) -> WorkoutApi {
    WorkoutApi::new(store, Arc::new(FixedClock(today)))
  }

  pub fn draft(name: &str, sets: u32, reps: &str) -> ExerciseDraft {
    ExerciseDraft {
      name: name.to_string(),
      sets,
      rep_range: reps.to_string(),
    }
  }

  fn set(weight: f64, reps: u32) -> PerformedSet {
    PerformedSet { reps, weight }
  }

  fn order_indices(exercises: &[Exercise]) -> Vec<i64> {
    exercises.iter().map(|e| e.order_index).collect()
  }

  #[tokio::test]
  async fn test_create_routine_orders_exercises() {
    let store = Arc::new(MemoryStore::new());
    let api = api_on(store, day(16));

    let routine = api
      .create_routine(
        "Push Day",
        &[draft("Bench Press", 3, "8-12"), draft("Dips", 3, "10")],
      )
      .await
      .unwrap();

    let exercises = api.get_exercises(&routine.id).await.unwrap();
    assert_eq!(exercises[0].name, "Bench Press");
    assert_eq!(exercises[1].name, "Dips");
    assert_eq!(order_indices(&exercises), vec![0, 1]);
  }

  #[tokio::test]
  async fn test_create_routine_validates_before_any_call() {
    let store = Arc::new(MemoryStore::new());
    let api = api_on(store.clone(), day(16));

    let err = api.create_routine("Push Day", &[]).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::NoExercises)));

    let err = api
      .create_routine("  ", &[draft("Dips", 3, "10")])
      .await
      .unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::Required(_))));
    assert!(store.rows("routines").is_empty());
  }

  #[tokio::test]
  async fn test_order_indices_stay_dense() {
    let store = Arc::new(MemoryStore::new());
    let api = api_on(store, day(16));
    let routine = api
      .create_routine(
        "Legs",
        &[draft("Squat", 5, "5"), draft("Lunge", 3, "10"), draft("Calf", 4, "15")],
      )
      .await
      .unwrap();

    api.add_exercise(&routine.id, &draft("Curl", 3, "12")).await.unwrap();
    let exercises = api.get_exercises(&routine.id).await.unwrap();
    assert_eq!(order_indices(&exercises), vec![0, 1, 2, 3]);

    // Remove from the middle, then append and reorder
    api.delete_exercise(&routine.id, &exercises[1].id).await.unwrap();
    api.add_exercise(&routine.id, &draft("Plank", 3, "60")).await.unwrap();
    let exercises = api.get_exercises(&routine.id).await.unwrap();
    assert_eq!(order_indices(&exercises), vec![0, 1, 2, 3]);
    assert_eq!(exercises[3].name, "Plank");

    let moved = api
      .move_exercise(&routine.id, &exercises[3].id, Direction::Up)
      .await
      .unwrap();
    assert!(moved);
    let exercises = api.get_exercises(&routine.id).await.unwrap();
    assert_eq!(order_indices(&exercises), vec![0, 1, 2, 3]);
    let names: Vec<&str> = exercises.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Squat", "Calf", "Plank", "Curl"]);

    let moved = api
      .move_exercise(&routine.id, &exercises[0].id, Direction::Up)
      .await
      .unwrap();
    assert!(!moved);
  }

  #[tokio::test]
  async fn test_get_or_create_today_log_is_stable() {
    let store = Arc::new(MemoryStore::new());
    let api = api_on(store.clone(), day(16));
    let routine = api
      .create_routine("Pull", &[draft("Row", 3, "8-12")])
      .await
      .unwrap();

    assert!(api.get_today_log(&routine.id).await.unwrap().is_none());
    let first = api.get_or_create_today_log(&routine.id).await.unwrap();
    let second = api.get_or_create_today_log(&routine.id).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.date, day(16));
    assert_eq!(store.rows("daily_logs").len(), 1);
  }

  /// Serves one empty daily-log read, as if another client inserted the
  /// row between our check and our insert.
  struct LostRaceStore {
    inner: Arc<MemoryStore>,
    stale_read: std::sync::atomic::AtomicBool,
  }

  #[async_trait::async_trait]
  impl DataStore for LostRaceStore {
    async fn select(&self, table: &str, query: &Select) -> StoreResult<Vec<serde_json::Value>> {
      use std::sync::atomic::Ordering;
      if table == DailyLog::TABLE && self.stale_read.swap(false, Ordering::SeqCst) {
        return Ok(Vec::new());
      }
      self.inner.select(table, query).await
    }

    async fn insert(
      &self,
      table: &str,
      rows: Vec<serde_json::Value>,
    ) -> StoreResult<Vec<serde_json::Value>> {
      self.inner.insert(table, rows).await
    }

    async fn update(
      &self,
      table: &str,
      filters: &[store::Filter],
      patch: serde_json::Value,
    ) -> StoreResult<()> {
      self.inner.update(table, filters, patch).await
    }

    async fn delete(&self, table: &str, filters: &[store::Filter]) -> StoreResult<()> {
      self.inner.delete(table, filters).await
    }
  }

  #[tokio::test]
  async fn test_get_or_create_recovers_from_duplicate_insert() {
    let store = Arc::new(MemoryStore::new());
    let api = api_on(store.clone(), day(16));
    let routine = api
      .create_routine("Pull", &[draft("Row", 3, "8-12")])
      .await
      .unwrap();
    let existing = api.get_or_create_today_log(&routine.id).await.unwrap();

    let racing = WorkoutApi::new(
      Arc::new(LostRaceStore {
        inner: store.clone(),
        stale_read: std::sync::atomic::AtomicBool::new(true),
      }),
      Arc::new(FixedClock(day(16))),
    );
    let log = racing.get_or_create_today_log(&routine.id).await.unwrap();
    assert_eq!(log.id, existing.id);
    assert_eq!(store.rows("daily_logs").len(), 1);
  }

  #[tokio::test]
  async fn test_resaving_sets_replaces_rows() {
    let store = Arc::new(MemoryStore::new());
    let api = api_on(store.clone(), day(16));
    let routine = api
      .create_routine("Push", &[draft("Bench", 3, "8-12")])
      .await
      .unwrap();
    let bench = api.get_exercises(&routine.id).await.unwrap().remove(0);

    let sets = [set(60.0, 8), set(60.0, 8), set(60.0, 6)];
    let first = api.save_exercise_sets(&routine.id, &bench.id, &sets).await.unwrap();
    let sets = [set(62.5, 8), set(62.5, 7), set(60.0, 6)];
    let second = api.save_exercise_sets(&routine.id, &bench.id, &sets).await.unwrap();
    assert_eq!(first.id, second.id);

    let logs = api.get_set_logs(&first.id).await.unwrap();
    assert_eq!(logs.len(), 3);
    let numbers: Vec<u32> = logs.iter().map(|l| l.set_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(logs[0].weight, 62.5);
  }

  #[tokio::test]
  async fn test_done_exercise_ids() {
    let store = Arc::new(MemoryStore::new());
    let api = api_on(store, day(16));
    let routine = api
      .create_routine("Push", &[draft("Bench", 2, "8-12"), draft("Dips", 2, "10")])
      .await
      .unwrap();
    let exercises = api.get_exercises(&routine.id).await.unwrap();

    let log = api
      .save_exercise_sets(&routine.id, &exercises[1].id, &[set(0.0, 10), set(0.0, 9)])
      .await
      .unwrap();
    let done = api.get_done_exercise_ids(&log.id).await.unwrap();
    assert_eq!(done.len(), 1);
    assert!(done.contains(&exercises[1].id));
  }

  #[tokio::test]
  async fn test_last_session_picks_latest_earlier_log() {
    let store = Arc::new(MemoryStore::new());
    let routine_id;
    let bench_id;
    {
      let api = api_on(store.clone(), day(10));
      let routine = api
        .create_routine("Push", &[draft("Bench", 2, "8-12")])
        .await
        .unwrap();
      bench_id = api.get_exercises(&routine.id).await.unwrap().remove(0).id;
      routine_id = routine.id;
      api
        .save_exercise_sets(&routine_id, &bench_id, &[set(50.0, 10), set(50.0, 9)])
        .await
        .unwrap();
    }
    api_on(store.clone(), day(13))
      .save_exercise_sets(&routine_id, &bench_id, &[set(55.0, 8), set(55.0, 8)])
      .await
      .unwrap();

    let api = api_on(store, day(16));
    let last = api.get_last_session(&routine_id, false).await.unwrap().unwrap();
    assert_eq!(last.date, day(13));
    assert_eq!(
      last.sets_for(&bench_id).unwrap(),
      &[set(55.0, 8), set(55.0, 8)]
    );
  }
}
