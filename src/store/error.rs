use thiserror::Error;

/// Postgres error code for a unique constraint violation.
const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Failure of any remote data store operation.
///
/// Transport failures, permission errors and constraint violations all
/// collapse into this one error kind. Callers propagate it unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataStoreError {
  #[error("request failed: {message}")]
  Request { message: String },

  #[error("data store returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("duplicate row: {message}")]
  UniqueViolation { message: String },

  #[error("failed to decode response: {message}")]
  Decode { message: String },

  #[error("expected at most one row, got {count}")]
  MultipleRows { count: usize },
}

impl DataStoreError {
  pub fn request(message: impl Into<String>) -> Self {
    Self::Request {
      message: message.into(),
    }
  }

  pub fn decode(message: impl Into<String>) -> Self {
    Self::Decode {
      message: message.into(),
    }
  }

  /// Build an error from a provider error payload, recognising unique violations.
  pub fn from_provider(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
    let message = message.into();
    if code == Some(UNIQUE_VIOLATION_CODE) {
      Self::UniqueViolation { message }
    } else {
      Self::Status { status, message }
    }
  }

  pub fn is_unique_violation(&self) -> bool {
    matches!(self, Self::UniqueViolation { .. })
  }
}

impl From<serde_json::Error> for DataStoreError {
  fn from(e: serde_json::Error) -> Self {
    Self::decode(e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unique_violation_code_is_recognised() {
    let err = DataStoreError::from_provider(409, Some("23505"), "duplicate key");
    assert!(err.is_unique_violation());

    let err = DataStoreError::from_provider(403, Some("42501"), "permission denied");
    assert!(!err.is_unique_violation());
    assert_eq!(err.to_string(), "data store returned 403: permission denied");
  }
}
