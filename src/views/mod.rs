//! View models for the catalog, routine editor and daily logging views.
//!
//! Views read through the cached client and turn mutation outcomes into
//! transient notices. Rendering them is left to the caller.

mod catalog;
mod editor;
mod log;

pub use catalog::{CatalogView, RoutineDetail};
pub use editor::{ExerciseInput, RoutineEditor};
pub use log::{DailyLogView, ExerciseRow};

use std::fmt;

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Success,
  Error,
}

/// A transient notification shown after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub level: NoticeLevel,
  pub message: String,
}

impl Notice {
  pub fn success(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Success,
      message: message.into(),
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Error,
      message: message.into(),
    }
  }

  pub fn is_error(&self) -> bool {
    self.level == NoticeLevel::Error
  }

  /// Success message on `Ok`, the error's message otherwise.
  pub fn from_result(result: AppResult<String>) -> Self {
    match result {
      Ok(message) => Self::success(message),
      Err(e) => {
        tracing::warn!("Mutation failed: {}", e);
        Self::error(e.to_string())
      }
    }
  }
}

impl fmt::Display for Notice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.level {
      NoticeLevel::Success => write!(f, "{}", self.message),
      NoticeLevel::Error => write!(f, "error: {}", self.message),
    }
  }
}
