use crate::error::{AppError, AppResult};
use crate::workout::{CachedWorkoutClient, Direction, ExerciseDraft, ExercisePatch, ValidationError};

use super::Notice;

/// Raw exercise fields as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct ExerciseInput {
  pub name: String,
  pub sets: String,
  pub reps: String,
}

impl ExerciseInput {
  fn parse(&self) -> Result<ExerciseDraft, ValidationError> {
    ExerciseDraft::parse(&self.name, &self.sets, &self.reps)
  }
}

/// Routine editor. Every action validates locally first and reports a notice.
pub struct RoutineEditor {
  client: CachedWorkoutClient,
}

impl RoutineEditor {
  pub fn new(client: CachedWorkoutClient) -> Self {
    Self { client }
  }

  pub async fn create(&self, name: &str, exercises: &[ExerciseInput]) -> Notice {
    Notice::from_result(self.try_create(name, exercises).await)
  }

  async fn try_create(&self, name: &str, exercises: &[ExerciseInput]) -> AppResult<String> {
    let drafts = exercises
      .iter()
      .map(ExerciseInput::parse)
      .collect::<Result<Vec<_>, _>>()?;
    let routine = self.client.create_routine(name, &drafts).await?;
    Ok(format!("Created routine {} ({})", routine.name, routine.id))
  }

  pub async fn rename(&self, routine_id: &str, name: &str) -> Notice {
    let result = self.client.update_routine(routine_id, name).await;
    Notice::from_result(result.map(|()| format!("Renamed routine to {}", name.trim())))
  }

  pub async fn delete(&self, routine_id: &str) -> Notice {
    let result = self.client.delete_routine(routine_id).await;
    Notice::from_result(
      result
        .map(|()| format!("Deleted routine {}", routine_id))
        .map_err(AppError::from),
    )
  }

  pub async fn add_exercise(&self, routine_id: &str, input: &ExerciseInput) -> Notice {
    Notice::from_result(self.try_add_exercise(routine_id, input).await)
  }

  async fn try_add_exercise(&self, routine_id: &str, input: &ExerciseInput) -> AppResult<String> {
    let draft = input.parse()?;
    let exercise = self.client.add_exercise(routine_id, &draft).await?;
    Ok(format!(
      "Added {} at position {}",
      exercise.name,
      exercise.order_index + 1
    ))
  }

  /// Change whichever fields were given; the rest stay as they are.
  pub async fn edit_exercise(
    &self,
    routine_id: &str,
    exercise_id: &str,
    name: Option<&str>,
    sets: Option<&str>,
    reps: Option<&str>,
  ) -> Notice {
    Notice::from_result(
      self
        .try_edit_exercise(routine_id, exercise_id, name, sets, reps)
        .await,
    )
  }

  async fn try_edit_exercise(
    &self,
    routine_id: &str,
    exercise_id: &str,
    name: Option<&str>,
    sets: Option<&str>,
    reps: Option<&str>,
  ) -> AppResult<String> {
    let patch = ExercisePatch::parse(name, sets, reps)?;
    if patch.is_empty() {
      return Ok("Nothing to change".to_string());
    }
    self
      .client
      .update_exercise(routine_id, exercise_id, &patch)
      .await?;
    Ok(format!("Updated exercise {}", exercise_id))
  }

  pub async fn remove_exercise(&self, routine_id: &str, exercise_id: &str) -> Notice {
    let result = self.client.delete_exercise(routine_id, exercise_id).await;
    Notice::from_result(
      result
        .map(|()| format!("Removed exercise {}", exercise_id))
        .map_err(AppError::from),
    )
  }

  pub async fn move_exercise(&self, routine_id: &str, exercise_id: &str, direction: Direction) -> Notice {
    let result = self
      .client
      .move_exercise(routine_id, exercise_id, direction)
      .await;
    Notice::from_result(result.map(|moved| {
      if moved {
        let way = match direction {
          Direction::Up => "up",
          Direction::Down => "down",
        };
        format!("Moved exercise {} {}", exercise_id, way)
      } else {
        "Already at the edge of the list".to_string()
      }
    }))
  }
}
