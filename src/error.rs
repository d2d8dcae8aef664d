use thiserror::Error;

use crate::auth::AuthError;
use crate::store::DataStoreError;
use crate::workout::ValidationError;

/// Failure of a view-level operation. None of these are fatal; the user can retry.
#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  DataStore(#[from] DataStoreError),

  #[error(transparent)]
  Session(#[from] AuthError),

  #[error("not signed in")]
  Unauthenticated,

  #[error("unknown {kind} {id}")]
  NotFound { kind: &'static str, id: String },
}

impl AppError {
  pub fn not_found(kind: &'static str, id: &str) -> Self {
    Self::NotFound {
      kind,
      id: id.to_string(),
    }
  }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
