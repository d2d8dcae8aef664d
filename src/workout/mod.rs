mod api;
mod cached_client;
mod types;
mod validate;

pub use api::{Direction, WorkoutApi};
pub use cached_client::CachedWorkoutClient;
pub use types::{
  DailyLog, Exercise, ExerciseDraft, ExercisePatch, LastSession, PerformedSet, Routine, SetLog,
};
pub use validate::{performed_sets, ValidationError};

#[cfg(test)]
pub(crate) use api::tests as fixtures;
