//! Remote data store access.
//!
//! The store is a hosted relational database exposed through a generic
//! select/insert/update/delete API. `DataStore` is the raw, row-as-JSON
//! contract; the free functions below layer typed access on top of it for
//! anything implementing `Record`.

mod error;
#[cfg(test)]
pub mod memory;
mod rest;

pub use error::DataStoreError;
pub use rest::RestStore;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

pub type StoreResult<T> = std::result::Result<T, DataStoreError>;

/// Row filter applied by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
  /// `column = value`
  Eq(String, String),
  /// `column < value`
  Lt(String, String),
}

impl Filter {
  pub fn eq(column: &str, value: impl ToString) -> Self {
    Self::Eq(column.to_string(), value.to_string())
  }

  pub fn lt(column: &str, value: impl ToString) -> Self {
    Self::Lt(column.to_string(), value.to_string())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
  pub column: String,
  pub ascending: bool,
}

/// A list query: filters, at most one ordering column and an optional limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Select {
  pub columns: Option<String>,
  pub filters: Vec<Filter>,
  pub order: Option<Order>,
  pub limit: Option<usize>,
}

impl Select {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn columns(mut self, columns: &str) -> Self {
    self.columns = Some(columns.to_string());
    self
  }

  pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
    self.filters.push(Filter::eq(column, value));
    self
  }

  pub fn lt(mut self, column: &str, value: impl ToString) -> Self {
    self.filters.push(Filter::lt(column, value));
    self
  }

  pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
    self.order = Some(Order {
      column: column.to_string(),
      ascending,
    });
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }
}

/// Raw data store contract. Rows travel as JSON objects.
#[async_trait]
pub trait DataStore: Send + Sync {
  async fn select(&self, table: &str, query: &Select) -> StoreResult<Vec<Value>>;

  /// Insert rows and return them as stored (with generated columns filled in).
  async fn insert(&self, table: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>>;

  async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> StoreResult<()>;

  async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<()>;
}

/// A row type stored in a named collection.
pub trait Record: Serialize + DeserializeOwned + Send {
  const TABLE: &'static str;
}

/// List rows of `T` matching `query`.
pub async fn list<T: Record>(store: &dyn DataStore, query: &Select) -> StoreResult<Vec<T>> {
  list_table(store, T::TABLE, query).await
}

/// List rows of any table, decoding each into `T` (useful with projections).
pub async fn list_table<T: DeserializeOwned>(
  store: &dyn DataStore,
  table: &str,
  query: &Select,
) -> StoreResult<Vec<T>> {
  store
    .select(table, query)
    .await?
    .into_iter()
    .map(|row| serde_json::from_value(row).map_err(DataStoreError::from))
    .collect()
}

/// Fetch zero or one row; more than one match is an error.
pub async fn get_one_or_none<T: Record>(
  store: &dyn DataStore,
  query: &Select,
) -> StoreResult<Option<T>> {
  let query = query.clone().limit(2);
  let mut rows: Vec<T> = list(store, &query).await?;
  match rows.len() {
    0 => Ok(None),
    1 => Ok(rows.pop()),
    count => Err(DataStoreError::MultipleRows { count }),
  }
}

/// Insert one row and return the stored record.
pub async fn insert_one<T: Record, N: Serialize>(store: &dyn DataStore, row: &N) -> StoreResult<T> {
  let value = serde_json::to_value(row)?;
  let mut rows = store.insert(T::TABLE, vec![value]).await?;
  let row = rows
    .pop()
    .ok_or_else(|| DataStoreError::decode(format!("insert into {} returned no row", T::TABLE)))?;
  Ok(serde_json::from_value(row)?)
}

/// Insert several rows at once, discarding the returned representation.
pub async fn insert_many<N: Serialize>(
  store: &dyn DataStore,
  table: &str,
  rows: &[N],
) -> StoreResult<()> {
  let values = rows
    .iter()
    .map(serde_json::to_value)
    .collect::<Result<Vec<_>, _>>()?;
  store.insert(table, values).await?;
  Ok(())
}

pub async fn update_by_id<P: Serialize>(
  store: &dyn DataStore,
  table: &str,
  id: &str,
  patch: &P,
) -> StoreResult<()> {
  let patch = serde_json::to_value(patch)?;
  store.update(table, &[Filter::eq("id", id)], patch).await
}

pub async fn delete_by_id(store: &dyn DataStore, table: &str, id: &str) -> StoreResult<()> {
  store.delete(table, &[Filter::eq("id", id)]).await
}
