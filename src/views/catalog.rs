use chrono::{DateTime, Utc};

use crate::cache::CacheSource;
use crate::error::{AppError, AppResult};
use crate::workout::{CachedWorkoutClient, Exercise, Routine};

/// A routine with its exercises in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDetail {
  pub routine: Routine,
  pub exercises: Vec<Exercise>,
}

/// Routine catalog: every routine by name, with one of them expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogView {
  pub routines: Vec<Routine>,
  pub selected: Option<RoutineDetail>,
  /// When the list was fetched, if it was served past its freshness window
  pub stale_since: Option<DateTime<Utc>>,
}

impl CatalogView {
  /// Load the catalog. Without a selection the first routine is expanded.
  pub async fn load(client: &CachedWorkoutClient, selected: Option<&str>) -> AppResult<Self> {
    let result = client.get_routines_cached().await?;
    let stale_since = (result.source == CacheSource::CacheStale).then_some(result.fetched_at);
    let routines = result.data;

    let routine = match selected {
      Some(id) => Some(
        routines
          .iter()
          .find(|r| r.id == id)
          .cloned()
          .ok_or_else(|| AppError::not_found("routine", id))?,
      ),
      None => routines.first().cloned(),
    };

    let selected = match routine {
      Some(routine) => {
        let exercises = client.get_exercises(&routine.id).await?;
        Some(RoutineDetail { routine, exercises })
      }
      None => None,
    };

    Ok(Self {
      routines,
      selected,
      stale_since,
    })
  }
}
