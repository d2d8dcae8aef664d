use chrono::{NaiveDate, Utc};

/// Source of "today" for date-dependent queries.
pub trait Clock: Send + Sync {
  fn today(&self) -> NaiveDate;
}

/// Today's UTC calendar date.
pub struct SystemClock;

impl Clock for SystemClock {
  fn today(&self) -> NaiveDate {
    Utc::now().date_naive()
  }
}

#[cfg(test)]
pub struct FixedClock(pub NaiveDate);

#[cfg(test)]
impl Clock for FixedClock {
  fn today(&self) -> NaiveDate {
    self.0
  }
}
