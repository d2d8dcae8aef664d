use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::store::Record;

/// A named, ordered collection of exercises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
  pub id: String,
  pub name: String,
  pub created_at: DateTime<Utc>,
}

impl Record for Routine {
  const TABLE: &'static str = "routines";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
  pub id: String,
  pub routine_id: String,
  pub name: String,
  pub sets: u32,
  /// Target reps, e.g. "8-12" or "10"
  pub rep_range: String,
  pub order_index: i64,
}

impl Record for Exercise {
  const TABLE: &'static str = "exercises";
}

/// One performed session of a routine on a calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLog {
  pub id: String,
  pub routine_id: String,
  pub date: NaiveDate,
  pub created_at: DateTime<Utc>,
}

impl Record for DailyLog {
  const TABLE: &'static str = "daily_logs";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetLog {
  pub id: String,
  pub daily_log_id: String,
  pub exercise_id: String,
  pub set_number: u32,
  pub reps: u32,
  #[serde(deserialize_with = "number_or_string")]
  pub weight: f64,
}

impl Record for SetLog {
  const TABLE: &'static str = "set_logs";
}

#[derive(Debug, Serialize)]
pub(crate) struct NewRoutine<'a> {
  pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewExercise<'a> {
  pub routine_id: &'a str,
  pub name: &'a str,
  pub sets: u32,
  pub rep_range: &'a str,
  pub order_index: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewDailyLog<'a> {
  pub routine_id: &'a str,
  pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewSetLog<'a> {
  pub daily_log_id: &'a str,
  pub exercise_id: &'a str,
  pub set_number: u32,
  pub reps: u32,
  pub weight: f64,
}

/// Fields of an exercise the editor may change. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExercisePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sets: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rep_range: Option<String>,
}

impl ExercisePatch {
  pub fn is_empty(&self) -> bool {
    self.name.is_none() && self.sets.is_none() && self.rep_range.is_none()
  }
}

/// A validated exercise definition not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDraft {
  pub name: String,
  pub sets: u32,
  pub rep_range: String,
}

/// One performed set: reps at a weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformedSet {
  pub reps: u32,
  pub weight: f64,
}

/// The most recent matching daily log and its per-exercise set history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSession {
  pub daily_log_id: String,
  pub date: NaiveDate,
  /// Exercise id to its sets in set-number order
  pub exercises: BTreeMap<String, Vec<PerformedSet>>,
}

impl LastSession {
  pub fn sets_for(&self, exercise_id: &str) -> Option<&[PerformedSet]> {
    self.exercises.get(exercise_id).map(Vec::as_slice)
  }
}

/// Numeric columns may arrive as JSON numbers or as decimal strings.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Number(f64),
    Text(String),
  }

  match Raw::deserialize(deserializer)? {
    Raw::Number(n) => Ok(n),
    Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_set_log_weight_accepts_decimal_string() {
    let row = json!({
      "id": "s-1",
      "daily_log_id": "d-1",
      "exercise_id": "e-1",
      "set_number": 1,
      "reps": 8,
      "weight": "62.5"
    });
    let log: SetLog = serde_json::from_value(row).unwrap();
    assert_eq!(log.weight, 62.5);
  }

  #[test]
  fn test_daily_log_date_format() {
    let row = json!({
      "id": "d-1",
      "routine_id": "r-1",
      "date": "2026-10-16",
      "created_at": "2026-10-16T08:30:00.123456+00:00"
    });
    let log: DailyLog = serde_json::from_value(row).unwrap();
    assert_eq!(log.date, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
  }

  #[test]
  fn test_patch_serializes_only_set_fields() {
    let patch = ExercisePatch {
      sets: Some(4),
      ..Default::default()
    };
    assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "sets": 4 }));
    assert!(!patch.is_empty());
    assert!(ExercisePatch::default().is_empty());
  }
}
