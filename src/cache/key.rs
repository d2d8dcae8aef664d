//! Cache keys for workout queries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The named query a key addresses, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
  Routines,
  ExercisesByRoutine,
  LastSession,
  TodayLog,
  DoneExerciseIds,
}

impl QueryKind {
  /// Whether results of this kind may be written to the persisted snapshot.
  ///
  /// Queries that depend on today's date must be re-derived after a restart,
  /// and the done-exercise set is kept in memory only.
  pub fn is_persisted(self) -> bool {
    match self {
      Self::Routines | Self::ExercisesByRoutine => true,
      Self::LastSession | Self::TodayLog | Self::DoneExerciseIds => false,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Routines => "routines",
      Self::ExercisesByRoutine => "exercises-by-routine",
      Self::LastSession => "last-session",
      Self::TodayLog => "today-log",
      Self::DoneExerciseIds => "done-exercise-ids",
    }
  }
}

/// A query kind plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum QueryKey {
  Routines,
  ExercisesByRoutine { routine_id: String },
  LastSession { routine_id: String, include_today: bool },
  TodayLog { routine_id: String },
  DoneExerciseIds { daily_log_id: String },
}

impl QueryKey {
  pub fn exercises(routine_id: &str) -> Self {
    Self::ExercisesByRoutine {
      routine_id: routine_id.to_string(),
    }
  }

  pub fn last_session(routine_id: &str, include_today: bool) -> Self {
    Self::LastSession {
      routine_id: routine_id.to_string(),
      include_today,
    }
  }

  pub fn today_log(routine_id: &str) -> Self {
    Self::TodayLog {
      routine_id: routine_id.to_string(),
    }
  }

  pub fn done_exercise_ids(daily_log_id: &str) -> Self {
    Self::DoneExerciseIds {
      daily_log_id: daily_log_id.to_string(),
    }
  }

  pub fn kind(&self) -> QueryKind {
    match self {
      Self::Routines => QueryKind::Routines,
      Self::ExercisesByRoutine { .. } => QueryKind::ExercisesByRoutine,
      Self::LastSession { .. } => QueryKind::LastSession,
      Self::TodayLog { .. } => QueryKind::TodayLog,
      Self::DoneExerciseIds { .. } => QueryKind::DoneExerciseIds,
    }
  }

  pub fn is_persisted(&self) -> bool {
    self.kind().is_persisted()
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = self.kind().name();
    match self {
      Self::Routines => write!(f, "[{}]", name),
      Self::ExercisesByRoutine { routine_id } | Self::TodayLog { routine_id } => {
        write!(f, "[{}, {}]", name, routine_id)
      }
      Self::LastSession {
        routine_id,
        include_today,
      } => write!(f, "[{}, {}, {}]", name, routine_id, include_today),
      Self::DoneExerciseIds { daily_log_id } => write!(f, "[{}, {}]", name, daily_log_id),
    }
  }
}

/// Selects cache entries to invalidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
  /// One specific key
  Exact(QueryKey),
  /// Every key of a kind, whatever its parameters
  Kind(QueryKind),
}

impl KeyPattern {
  pub fn matches(&self, key: &QueryKey) -> bool {
    match self {
      Self::Exact(k) => k == key,
      Self::Kind(kind) => key.kind() == *kind,
    }
  }
}
