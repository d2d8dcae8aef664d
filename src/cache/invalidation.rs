//! Which cached queries each mutation makes stale.
//!
//! The rules live in one static table so they can be checked without any
//! view or network code involved.

use super::key::{KeyPattern, QueryKey, QueryKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
  CreateRoutine,
  UpdateRoutine,
  DeleteRoutine,
  CreateExercise,
  UpdateExercise,
  DeleteExercise,
  ReorderExercises,
  SaveSetLog,
}

/// A key shape resolved against a mutation's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
  Routines,
  ExercisesOfRoutine,
  TodayLogOfRoutine,
  DoneIdsOfLog,
  LastSessionOfRoutine { include_today: bool },
}

const ROUTINE_LIST: &[Target] = &[Target::Routines];
const EXERCISE_LIST: &[Target] = &[Target::ExercisesOfRoutine];
const SET_LOG_SAVED: &[Target] = &[
  Target::TodayLogOfRoutine,
  Target::DoneIdsOfLog,
  Target::ExercisesOfRoutine,
  Target::LastSessionOfRoutine { include_today: false },
  Target::LastSessionOfRoutine { include_today: true },
];

const RULES: &[(MutationKind, &[Target])] = &[
  (MutationKind::CreateRoutine, ROUTINE_LIST),
  (MutationKind::UpdateRoutine, ROUTINE_LIST),
  (MutationKind::DeleteRoutine, ROUTINE_LIST),
  (MutationKind::CreateExercise, EXERCISE_LIST),
  (MutationKind::UpdateExercise, EXERCISE_LIST),
  (MutationKind::DeleteExercise, EXERCISE_LIST),
  (MutationKind::ReorderExercises, EXERCISE_LIST),
  (MutationKind::SaveSetLog, SET_LOG_SAVED),
];

/// A completed mutation and the ids it touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
  CreateRoutine,
  UpdateRoutine { routine_id: String },
  DeleteRoutine { routine_id: String },
  CreateExercise { routine_id: String },
  UpdateExercise { routine_id: String },
  DeleteExercise { routine_id: String },
  ReorderExercises { routine_id: String },
  /// `daily_log_id` is the log the sets went to, when known.
  SaveSetLog {
    routine_id: String,
    daily_log_id: Option<String>,
  },
}

impl Mutation {
  pub fn kind(&self) -> MutationKind {
    match self {
      Self::CreateRoutine => MutationKind::CreateRoutine,
      Self::UpdateRoutine { .. } => MutationKind::UpdateRoutine,
      Self::DeleteRoutine { .. } => MutationKind::DeleteRoutine,
      Self::CreateExercise { .. } => MutationKind::CreateExercise,
      Self::UpdateExercise { .. } => MutationKind::UpdateExercise,
      Self::DeleteExercise { .. } => MutationKind::DeleteExercise,
      Self::ReorderExercises { .. } => MutationKind::ReorderExercises,
      Self::SaveSetLog { .. } => MutationKind::SaveSetLog,
    }
  }

  fn routine_id(&self) -> Option<&str> {
    match self {
      Self::CreateRoutine => None,
      Self::UpdateRoutine { routine_id }
      | Self::DeleteRoutine { routine_id }
      | Self::CreateExercise { routine_id }
      | Self::UpdateExercise { routine_id }
      | Self::DeleteExercise { routine_id }
      | Self::ReorderExercises { routine_id }
      | Self::SaveSetLog { routine_id, .. } => Some(routine_id),
    }
  }

  fn daily_log_id(&self) -> Option<&str> {
    match self {
      Self::SaveSetLog { daily_log_id, .. } => daily_log_id.as_deref(),
      _ => None,
    }
  }

  /// Keys this mutation may have made stale.
  pub fn affected_keys(&self) -> Vec<KeyPattern> {
    let targets = RULES
      .iter()
      .find(|(kind, _)| *kind == self.kind())
      .map(|(_, targets)| *targets)
      .unwrap_or_default();

    targets.iter().filter_map(|t| self.resolve(*t)).collect()
  }

  fn resolve(&self, target: Target) -> Option<KeyPattern> {
    let pattern = match target {
      Target::Routines => KeyPattern::Exact(QueryKey::Routines),
      Target::ExercisesOfRoutine => KeyPattern::Exact(QueryKey::exercises(self.routine_id()?)),
      Target::TodayLogOfRoutine => KeyPattern::Exact(QueryKey::today_log(self.routine_id()?)),
      Target::LastSessionOfRoutine { include_today } => {
        KeyPattern::Exact(QueryKey::last_session(self.routine_id()?, include_today))
      }
      // Without the log id every done-set is suspect.
      Target::DoneIdsOfLog => match self.daily_log_id() {
        Some(id) => KeyPattern::Exact(QueryKey::done_exercise_ids(id)),
        None => KeyPattern::Kind(QueryKind::DoneExerciseIds),
      },
    };
    Some(pattern)
  }
}
