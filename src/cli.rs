use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::workout::Direction;

#[derive(Parser, Debug)]
#[command(name = "worklog")]
#[command(about = "Track workout routines and the sets you lift")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/worklog/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List routines and the exercises of one of them
  Routines {
    /// Routine to expand (default: first by name)
    #[arg(short, long)]
    routine: Option<String>,
  },

  /// Create and change routines
  #[command(subcommand)]
  Editor(EditorCommand),

  /// Log today's sets
  #[command(subcommand)]
  Log(LogCommand),

  /// Session with the identity provider
  #[command(subcommand)]
  Auth(AuthCommand),
}

impl Command {
  /// Workout commands need a signed-in user; session commands do not.
  pub fn requires_session(&self) -> bool {
    !matches!(self, Command::Auth(_))
  }
}

#[derive(Subcommand, Debug)]
pub enum EditorCommand {
  /// Create a routine with its initial exercises
  Create {
    name: String,
    /// Exercise as NAME:SETS:REPS, e.g. "Bench Press:3:8-12"; repeat in order
    #[arg(short, long = "exercise", value_name = "NAME:SETS:REPS", required = true)]
    exercises: Vec<String>,
  },
  Rename {
    routine: String,
    name: String,
  },
  /// Delete a routine with its exercises and logs
  Delete {
    routine: String,
  },
  /// Append an exercise to a routine
  AddExercise {
    routine: String,
    name: String,
    sets: String,
    reps: String,
  },
  /// Change some fields of an exercise
  EditExercise {
    routine: String,
    exercise: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    sets: Option<String>,
    #[arg(long)]
    reps: Option<String>,
  },
  RemoveExercise {
    routine: String,
    exercise: String,
  },
  /// Swap an exercise with its neighbour
  MoveExercise {
    routine: String,
    exercise: String,
    #[arg(value_enum)]
    direction: MoveDirection,
  },
}

#[derive(Subcommand, Debug)]
pub enum LogCommand {
  /// Today's progress with hints from the last session
  Show {
    #[arg(short, long)]
    routine: Option<String>,
  },
  /// Save one exercise's sets for today, one WEIGHTxREPS per target set
  Save {
    #[arg(short, long)]
    routine: String,
    #[arg(short, long)]
    exercise: String,
    #[arg(value_name = "WEIGHTxREPS", required = true)]
    sets: Vec<String>,
  },
  /// Most recent session of a routine
  Last {
    #[arg(short, long)]
    routine: String,
    /// Count today's session too
    #[arg(long)]
    include_today: bool,
  },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
  /// Show who is signed in
  Status,
  /// Print the URL that starts sign-in
  LoginUrl,
  /// Sign out and wipe the local cache
  Logout,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
  Up,
  Down,
}

impl From<MoveDirection> for Direction {
  fn from(d: MoveDirection) -> Self {
    match d {
      MoveDirection::Up => Direction::Up,
      MoveDirection::Down => Direction::Down,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_log_save() {
    let args = Args::parse_from([
      "worklog", "log", "save", "-r", "r-1", "-e", "e-1", "60x8", "60x8", "60x6",
    ]);
    match args.command {
      Command::Log(LogCommand::Save {
        routine,
        exercise,
        sets,
      }) => {
        assert_eq!(routine, "r-1");
        assert_eq!(exercise, "e-1");
        assert_eq!(sets, vec!["60x8", "60x8", "60x6"]);
      }
      other => panic!("unexpected command {:?}", other),
    }
  }

  #[test]
  fn test_parse_editor_create() {
    let args = Args::parse_from([
      "worklog",
      "--config",
      "w.yaml",
      "editor",
      "create",
      "Push Day",
      "-e",
      "Bench Press:3:8-12",
      "--exercise",
      "Dips:3:10",
    ]);
    assert_eq!(args.config, Some(PathBuf::from("w.yaml")));
    match args.command {
      Command::Editor(EditorCommand::Create { name, exercises }) => {
        assert_eq!(name, "Push Day");
        assert_eq!(exercises.len(), 2);
      }
      other => panic!("unexpected command {:?}", other),
    }
  }

  #[test]
  fn test_create_needs_an_exercise() {
    assert!(Args::try_parse_from(["worklog", "editor", "create", "Push Day"]).is_err());
  }

  #[test]
  fn test_only_workout_commands_require_a_session() {
    let parse = |argv: &[&str]| Args::parse_from(argv).command;
    assert!(parse(&["worklog", "routines"]).requires_session());
    assert!(parse(&["worklog", "log", "show"]).requires_session());
    assert!(!parse(&["worklog", "auth", "status"]).requires_session());
    assert!(!parse(&["worklog", "auth", "logout"]).requires_session());
  }
}
