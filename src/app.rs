use color_eyre::{eyre::eyre, Result};

use crate::auth::{IdentityProvider, RestIdentityProvider, SessionStore};
use crate::cli::{AuthCommand, Command, EditorCommand, LogCommand};
use crate::config::Config;
use crate::error::AppError;
use crate::views::{CatalogView, DailyLogView, ExerciseInput, Notice, RoutineEditor};
use crate::workout::{CachedWorkoutClient, Exercise, PerformedSet};

/// Main application state
pub struct App {
  /// Application configuration
  config: Config,

  /// Cached workout client
  client: CachedWorkoutClient,

  session: SessionStore,

  provider: RestIdentityProvider,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let client = CachedWorkoutClient::from_config(&config)?;
    let provider = RestIdentityProvider::new(&config)?;

    Ok(Self {
      config,
      client,
      session: SessionStore::new(),
      provider,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    self.session.start(&self.provider).await;

    // Every workout view sits behind sign-in
    if command.requires_session() && !self.session.reader().is_authenticated() {
      return Err(AppError::Unauthenticated.into());
    }

    let result = match command {
      Command::Routines { routine } => self.routines(routine.as_deref()).await,
      Command::Editor(command) => self.editor(command).await,
      Command::Log(command) => self.log(command).await,
      Command::Auth(command) => self.auth(command).await,
    };

    // Revalidation started by stale reads must land before the process exits
    self.client.cache().settle().await;
    for (key, error) in self.client.cache().failures() {
      eprintln!("Could not refresh {}: {}", key, error);
    }
    result
  }

  async fn routines(&self, selected: Option<&str>) -> Result<()> {
    let selected = selected.or(self.config.default_routine.as_deref());
    let view = CatalogView::load(&self.client, selected).await?;

    if view.routines.is_empty() {
      println!("No routines yet. Create one with `worklog editor create`.");
      return Ok(());
    }

    if let Some(fetched_at) = view.stale_since {
      println!("(cached at {}, refreshing)", fetched_at.format("%Y-%m-%d %H:%M"));
    }

    let selected_id = view.selected.as_ref().map(|d| d.routine.id.as_str());
    for routine in &view.routines {
      let marker = if Some(routine.id.as_str()) == selected_id { "*" } else { " " };
      println!("{} {}  ({})", marker, routine.name, routine.id);
    }

    if let Some(detail) = &view.selected {
      println!();
      println!("{}", detail.routine.name);
      for exercise in &detail.exercises {
        println!("  {}", exercise_line(exercise));
      }
    }
    Ok(())
  }

  async fn editor(&self, command: EditorCommand) -> Result<()> {
    let editor = RoutineEditor::new(self.client.clone());

    let notice = match command {
      EditorCommand::Create { name, exercises } => {
        let inputs = exercises
          .iter()
          .map(|e| parse_exercise_spec(e))
          .collect::<Result<Vec<_>>>()?;
        editor.create(&name, &inputs).await
      }
      EditorCommand::Rename { routine, name } => editor.rename(&routine, &name).await,
      EditorCommand::Delete { routine } => editor.delete(&routine).await,
      EditorCommand::AddExercise {
        routine,
        name,
        sets,
        reps,
      } => {
        let input = ExerciseInput { name, sets, reps };
        editor.add_exercise(&routine, &input).await
      }
      EditorCommand::EditExercise {
        routine,
        exercise,
        name,
        sets,
        reps,
      } => {
        editor
          .edit_exercise(
            &routine,
            &exercise,
            name.as_deref(),
            sets.as_deref(),
            reps.as_deref(),
          )
          .await
      }
      EditorCommand::RemoveExercise { routine, exercise } => {
        editor.remove_exercise(&routine, &exercise).await
      }
      EditorCommand::MoveExercise {
        routine,
        exercise,
        direction,
      } => editor.move_exercise(&routine, &exercise, direction.into()).await,
    };

    report(notice)
  }

  async fn log(&self, command: LogCommand) -> Result<()> {
    match command {
      LogCommand::Show { routine } => {
        let routine_id = self.resolve_routine(routine).await?;
        let view = DailyLogView::load(&self.client, &routine_id).await?;

        println!("{} on {}", view.routine.name, view.date);
        println!(
          "{}/{} done ({:.0}%)",
          view.done_count(),
          view.total(),
          view.completion_ratio() * 100.0
        );
        for row in &view.rows {
          let check = if row.done { "x" } else { " " };
          print!("  [{}] {}", check, exercise_line(&row.exercise));
          if let Some(hint) = &row.hint {
            print!("  last: {}", sets_line(hint));
          }
          println!();
        }
        if let Some(date) = view.last_session_date {
          println!("Hints from {}", date);
        }
        Ok(())
      }
      LogCommand::Save {
        routine,
        exercise,
        sets,
      } => report(DailyLogView::save_exercise(&self.client, &routine, &exercise, &sets).await),
      LogCommand::Last {
        routine,
        include_today,
      } => {
        let Some(last) = self.client.get_last_session(&routine, include_today).await? else {
          println!("No earlier session");
          return Ok(());
        };
        println!("Session of {}", last.date);
        let exercises = self.client.get_exercises(&routine).await?;
        for (exercise_id, sets) in &last.exercises {
          let name = exercises
            .iter()
            .find(|e| &e.id == exercise_id)
            .map(|e| e.name.as_str())
            .unwrap_or(exercise_id.as_str());
          println!("  {}: {}", name, sets_line(sets));
        }
        Ok(())
      }
    }
  }

  /// Routine given on the command line, then the configured default, then the first by name.
  async fn resolve_routine(&self, routine: Option<String>) -> Result<String> {
    if let Some(id) = routine.or_else(|| self.config.default_routine.clone()) {
      return Ok(id);
    }
    self
      .client
      .get_routines()
      .await?
      .into_iter()
      .next()
      .map(|r| r.id)
      .ok_or_else(|| eyre!("No routines yet. Create one with `worklog editor create`."))
  }

  async fn auth(&self, command: AuthCommand) -> Result<()> {
    match command {
      AuthCommand::Status => {
        match self.session.reader().current().identity() {
          Some(identity) => println!(
            "Signed in as {}",
            identity.email.as_deref().unwrap_or(identity.id.as_str())
          ),
          None => println!("Not signed in"),
        }
        Ok(())
      }
      AuthCommand::LoginUrl => {
        let url = self.provider.authorize_url().map_err(AppError::from)?;
        println!("{}", url);
        Ok(())
      }
      AuthCommand::Logout => {
        let result = self.session.sign_out(&self.provider, self.client.cache()).await;
        println!("Signed out; local cache cleared");
        result.map_err(AppError::from)?;
        Ok(())
      }
    }
  }
}

fn report(notice: Notice) -> Result<()> {
  if notice.is_error() {
    return Err(eyre!(notice.message));
  }
  println!("{}", notice);
  Ok(())
}

fn exercise_line(exercise: &Exercise) -> String {
  format!(
    "{}. {}  {} x {}  ({})",
    exercise.order_index + 1,
    exercise.name,
    exercise.sets,
    exercise.rep_range,
    exercise.id
  )
}

fn sets_line(sets: &[PerformedSet]) -> String {
  sets
    .iter()
    .map(|s| format!("{}x{}", s.weight, s.reps))
    .collect::<Vec<_>>()
    .join(", ")
}

/// Parse `NAME:SETS:REPS`. The name may itself contain colons.
fn parse_exercise_spec(spec: &str) -> Result<ExerciseInput> {
  let mut parts = spec.rsplitn(3, ':');
  match (parts.next(), parts.next(), parts.next()) {
    (Some(reps), Some(sets), Some(name)) => Ok(ExerciseInput {
      name: name.to_string(),
      sets: sets.to_string(),
      reps: reps.to_string(),
    }),
    _ => Err(eyre!(
      "Exercise must look like NAME:SETS:REPS, e.g. \"Bench Press:3:8-12\", got {:?}",
      spec
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_exercise_spec() {
    let input = parse_exercise_spec("Bench Press:3:8-12").unwrap();
    assert_eq!(input.name, "Bench Press");
    assert_eq!(input.sets, "3");
    assert_eq!(input.reps, "8-12");

    let input = parse_exercise_spec("Row: cable:4:10").unwrap();
    assert_eq!(input.name, "Row: cable");

    assert!(parse_exercise_spec("Bench Press:3").is_err());
  }

  #[test]
  fn test_sets_line() {
    let sets = [
      PerformedSet { reps: 8, weight: 60.0 },
      PerformedSet { reps: 6, weight: 62.5 },
    ];
    assert_eq!(sets_line(&sets), "60x8, 62.5x6");
  }
}
