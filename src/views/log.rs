use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::workout::{performed_sets, CachedWorkoutClient, Exercise, PerformedSet, Routine};

use super::Notice;

/// One exercise of the routine as shown in the daily logging view.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseRow {
  pub exercise: Exercise,
  /// At least one set recorded today
  pub done: bool,
  /// Sets from the last earlier session, as placeholders for today's entry
  pub hint: Option<Vec<PerformedSet>>,
}

/// Today's progress through one routine.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyLogView {
  pub routine: Routine,
  pub date: NaiveDate,
  pub rows: Vec<ExerciseRow>,
  /// Date of the session the hints come from
  pub last_session_date: Option<NaiveDate>,
}

impl DailyLogView {
  pub async fn load(client: &CachedWorkoutClient, routine_id: &str) -> AppResult<Self> {
    let routine = client
      .get_routines()
      .await?
      .into_iter()
      .find(|r| r.id == routine_id)
      .ok_or_else(|| AppError::not_found("routine", routine_id))?;

    let exercises = client.get_exercises(routine_id).await?;
    let done = match client.get_today_log(routine_id).await? {
      Some(log) => client.get_done_exercise_ids(&log.id).await?,
      None => BTreeSet::new(),
    };
    // Today's own numbers are never offered as hints
    let last = client.get_last_session(routine_id, false).await?;

    let rows = exercises
      .into_iter()
      .map(|exercise| ExerciseRow {
        done: done.contains(&exercise.id),
        hint: last
          .as_ref()
          .and_then(|l| l.sets_for(&exercise.id))
          .map(<[PerformedSet]>::to_vec),
        exercise,
      })
      .collect();

    Ok(Self {
      routine,
      date: client.today(),
      rows,
      last_session_date: last.map(|l| l.date),
    })
  }

  pub fn total(&self) -> usize {
    self.rows.len()
  }

  pub fn done_count(&self) -> usize {
    self.rows.iter().filter(|r| r.done).count()
  }

  /// Done over total; an empty routine counts as 0.
  pub fn completion_ratio(&self) -> f64 {
    if self.rows.is_empty() {
      return 0.0;
    }
    self.done_count() as f64 / self.total() as f64
  }

  pub fn remaining(&self) -> Vec<&Exercise> {
    self
      .rows
      .iter()
      .filter(|r| !r.done)
      .map(|r| &r.exercise)
      .collect()
  }

  /// Record today's sets for one exercise from `<weight>x<reps>` entries.
  pub async fn save_exercise(
    client: &CachedWorkoutClient,
    routine_id: &str,
    exercise_id: &str,
    entries: &[String],
  ) -> Notice {
    Notice::from_result(Self::try_save_exercise(client, routine_id, exercise_id, entries).await)
  }

  async fn try_save_exercise(
    client: &CachedWorkoutClient,
    routine_id: &str,
    exercise_id: &str,
    entries: &[String],
  ) -> AppResult<String> {
    let exercise = client
      .get_exercises(routine_id)
      .await?
      .into_iter()
      .find(|e| e.id == exercise_id)
      .ok_or_else(|| AppError::not_found("exercise", exercise_id))?;
    let sets = performed_sets(entries, exercise.sets)?;

    client
      .save_exercise_sets(routine_id, exercise_id, &sets)
      .await?;
    Ok(format!("Saved {} sets of {}", sets.len(), exercise.name))
  }
}
