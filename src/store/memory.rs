//! In-process data store used by tests.
//!
//! Mirrors the constraints the hosted database enforces: generated ids,
//! `created_at` defaults, unique natural keys and cascading deletes.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use super::{DataStore, DataStoreError, Filter, Select, StoreResult};

/// Unique column groups per table.
const UNIQUE_KEYS: &[(&str, &[&str])] = &[
  ("exercises", &["routine_id", "order_index"]),
  ("daily_logs", &["routine_id", "date"]),
  ("set_logs", &["daily_log_id", "exercise_id", "set_number"]),
];

/// Child tables removed when a parent row is deleted: (parent, child, foreign key).
const CASCADES: &[(&str, &str, &str)] = &[
  ("routines", "exercises", "routine_id"),
  ("routines", "daily_logs", "routine_id"),
  ("daily_logs", "set_logs", "daily_log_id"),
  ("exercises", "set_logs", "exercise_id"),
];

const TIMESTAMPED: &[&str] = &["routines", "daily_logs"];

#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<HashMap<String, Vec<Map<String, Value>>>>,
  next_id: AtomicUsize,
  selects: AtomicUsize,
  failing: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of `select` calls served so far.
  pub fn select_count(&self) -> usize {
    self.selects.load(AtomicOrdering::SeqCst)
  }

  /// Make every following operation fail until reset.
  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, AtomicOrdering::SeqCst);
  }

  /// Raw rows of a table, for assertions.
  pub fn rows(&self, table: &str) -> Vec<Map<String, Value>> {
    let tables = self.tables.lock().unwrap();
    tables.get(table).cloned().unwrap_or_default()
  }

  fn check_failing(&self) -> StoreResult<()> {
    if self.failing.load(AtomicOrdering::SeqCst) {
      return Err(DataStoreError::request("connection refused"));
    }
    Ok(())
  }

  fn delete_cascading(
    tables: &mut HashMap<String, Vec<Map<String, Value>>>,
    table: &str,
    filters: &[Filter],
  ) {
    let removed: Vec<Map<String, Value>> = match tables.get_mut(table) {
      Some(rows) => {
        let (gone, kept) = rows.drain(..).partition(|row| matches_all(row, filters));
        *rows = kept;
        gone
      }
      None => return,
    };

    for row in removed {
      let Some(id) = row.get("id").map(scalar_string) else {
        continue;
      };
      for (parent, child, fk) in CASCADES {
        if *parent == table {
          Self::delete_cascading(tables, child, &[Filter::eq(fk, &id)]);
        }
      }
    }
  }
}

#[async_trait]
impl DataStore for MemoryStore {
  async fn select(&self, table: &str, query: &Select) -> StoreResult<Vec<Value>> {
    self.selects.fetch_add(1, AtomicOrdering::SeqCst);
    self.check_failing()?;

    let tables = self.tables.lock().unwrap();
    let mut rows: Vec<Map<String, Value>> = tables
      .get(table)
      .map(|rows| {
        rows
          .iter()
          .filter(|row| matches_all(row, &query.filters))
          .cloned()
          .collect()
      })
      .unwrap_or_default();

    if let Some(order) = &query.order {
      rows.sort_by(|a, b| {
        let ord = compare(a.get(&order.column), b.get(&order.column));
        if order.ascending {
          ord
        } else {
          ord.reverse()
        }
      });
    }
    if let Some(limit) = query.limit {
      rows.truncate(limit);
    }

    let rows = rows
      .into_iter()
      .map(|row| match &query.columns {
        Some(columns) => {
          let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
          Value::Object(
            row
              .into_iter()
              .filter(|(k, _)| wanted.contains(&k.as_str()))
              .collect(),
          )
        }
        None => Value::Object(row),
      })
      .collect();
    Ok(rows)
  }

  async fn insert(&self, table: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
    self.check_failing()?;

    let mut tables = self.tables.lock().unwrap();
    let existing = tables.entry(table.to_string()).or_default();
    let unique = UNIQUE_KEYS
      .iter()
      .find(|(t, _)| *t == table)
      .map(|(_, cols)| *cols);

    let mut prepared = Vec::with_capacity(rows.len());
    for row in rows {
      let Value::Object(mut row) = row else {
        return Err(DataStoreError::Status {
          status: 400,
          message: "row must be an object".to_string(),
        });
      };
      let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
      row
        .entry("id")
        .or_insert_with(|| Value::String(format!("{}-{}", table, id)));
      if TIMESTAMPED.contains(&table) {
        row
          .entry("created_at")
          .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
      }

      if let Some(cols) = unique {
        let clash = existing
          .iter()
          .chain(prepared.iter())
          .any(|other| cols.iter().all(|c| row.get(*c) == other.get(*c)));
        if clash {
          return Err(DataStoreError::from_provider(
            409,
            Some("23505"),
            format!("duplicate key value violates unique constraint on {}", table),
          ));
        }
      }
      prepared.push(row);
    }

    existing.extend(prepared.iter().cloned());
    Ok(prepared.into_iter().map(Value::Object).collect())
  }

  async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> StoreResult<()> {
    self.check_failing()?;

    let Value::Object(patch) = patch else {
      return Err(DataStoreError::Status {
        status: 400,
        message: "patch must be an object".to_string(),
      });
    };
    let mut tables = self.tables.lock().unwrap();
    if let Some(rows) = tables.get_mut(table) {
      for row in rows.iter_mut().filter(|row| matches_all(row, filters)) {
        for (k, v) in &patch {
          row.insert(k.clone(), v.clone());
        }
      }
    }
    Ok(())
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<()> {
    self.check_failing()?;

    let mut tables = self.tables.lock().unwrap();
    Self::delete_cascading(&mut tables, table, filters);
    Ok(())
  }
}

fn matches_all(row: &Map<String, Value>, filters: &[Filter]) -> bool {
  filters.iter().all(|filter| match filter {
    Filter::Eq(column, value) => row.get(column).map(scalar_string).as_deref() == Some(value),
    Filter::Lt(column, value) => {
      compare(row.get(column), Some(&Value::String(value.clone()))) == Ordering::Less
    }
  })
}

fn scalar_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  match (a, b) {
    (Some(a), Some(b)) => {
      let (a, b) = (scalar_string(a), scalar_string(b));
      match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(&b),
      }
    }
    (None, Some(_)) => Ordering::Less,
    (Some(_), None) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
}
