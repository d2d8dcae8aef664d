//! Input checks applied before any remote call.

use thiserror::Error;

use super::types::{ExerciseDraft, ExercisePatch, PerformedSet};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("{0} is required")]
  Required(&'static str),

  #[error("{0} must be at least 1")]
  NonPositive(&'static str),

  #[error("rep range must look like 8-12 or 10, got {0:?}")]
  MalformedRepRange(String),

  #[error("{field} is not a valid number: {value:?}")]
  MalformedNumber { field: &'static str, value: String },

  #[error("expected {expected} sets, got {got}")]
  SetCount { expected: u32, got: usize },

  #[error("a routine needs at least one exercise")]
  NoExercises,
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Trimmed non-empty text.
pub fn required(field: &'static str, value: &str) -> ValidationResult<String> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ValidationError::Required(field));
  }
  Ok(value.to_string())
}

/// Positive integer without sign or leading zero.
pub fn positive_int(field: &'static str, value: &str) -> ValidationResult<u32> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ValidationError::Required(field));
  }
  if !value.chars().all(|c| c.is_ascii_digit()) {
    return Err(ValidationError::MalformedNumber {
      field,
      value: value.to_string(),
    });
  }
  if value.starts_with('0') {
    return Err(ValidationError::NonPositive(field));
  }
  value.parse().map_err(|_| ValidationError::MalformedNumber {
    field,
    value: value.to_string(),
  })
}

/// `digits` or `digits-digits` (a single dash or whitespace character may separate the bounds).
pub fn rep_range(value: &str) -> ValidationResult<String> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ValidationError::Required("rep range"));
  }

  let malformed = || ValidationError::MalformedRepRange(value.to_string());
  let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

  match value.find(|c: char| !c.is_ascii_digit()) {
    None => Ok(value.to_string()),
    Some(pos) => {
      let (low, rest) = value.split_at(pos);
      let mut rest = rest.chars();
      let separated = rest.next().is_some_and(|c| c == '-' || c.is_whitespace());
      if separated && digits(low) && digits(rest.as_str()) {
        Ok(value.to_string())
      } else {
        Err(malformed())
      }
    }
  }
}

/// Non-negative decimal: `digits` or `digits.digits`.
pub fn weight(value: &str) -> ValidationResult<f64> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ValidationError::Required("weight"));
  }

  let malformed = || ValidationError::MalformedNumber {
    field: "weight",
    value: value.to_string(),
  };
  let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

  let well_formed = match value.split_once('.') {
    Some((whole, frac)) => digits(whole) && digits(frac),
    None => digits(value),
  };
  if !well_formed {
    return Err(malformed());
  }
  value.parse().map_err(|_| malformed())
}

impl ExerciseDraft {
  pub fn parse(name: &str, sets: &str, reps: &str) -> ValidationResult<Self> {
    Ok(Self {
      name: required("name", name)?,
      sets: positive_int("sets", sets)?,
      rep_range: rep_range(reps)?,
    })
  }
}

impl ExercisePatch {
  /// Validate whichever fields were supplied.
  pub fn parse(
    name: Option<&str>,
    sets: Option<&str>,
    reps: Option<&str>,
  ) -> ValidationResult<Self> {
    Ok(Self {
      name: name.map(|n| required("name", n)).transpose()?,
      sets: sets.map(|s| positive_int("sets", s)).transpose()?,
      rep_range: reps.map(rep_range).transpose()?,
    })
  }
}

impl PerformedSet {
  /// Parse a `<weight>x<reps>` entry, e.g. `60x8` or `62.5x10`.
  pub fn parse(entry: &str) -> ValidationResult<Self> {
    let (w, r) = entry
      .trim()
      .split_once(['x', 'X'])
      .ok_or_else(|| ValidationError::MalformedNumber {
        field: "set",
        value: entry.to_string(),
      })?;
    Ok(Self {
      weight: weight(w)?,
      reps: positive_int("reps", r)?,
    })
  }
}

/// Parse one entry per target set of an exercise.
pub fn performed_sets(entries: &[String], target_sets: u32) -> ValidationResult<Vec<PerformedSet>> {
  if entries.len() != target_sets as usize {
    return Err(ValidationError::SetCount {
      expected: target_sets,
      got: entries.len(),
    });
  }
  entries.iter().map(|e| PerformedSet::parse(e)).collect()
}
