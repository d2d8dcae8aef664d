use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{DataStore, DataStoreError, Filter, Select, StoreResult};
use crate::config::Config;

/// Error payload returned by the REST gateway.
#[derive(Debug, Default, Deserialize)]
struct ApiError {
  code: Option<String>,
  message: Option<String>,
  details: Option<String>,
}

/// Data store client speaking the hosted database's REST dialect.
#[derive(Clone)]
pub struct RestStore {
  http: reqwest::Client,
  base: Url,
  api_key: String,
  access_token: Option<String>,
}

impl RestStore {
  pub fn new(config: &Config) -> color_eyre::Result<Self> {
    let base = Url::parse(&config.store.url)
      .map_err(|e| color_eyre::eyre::eyre!("Invalid store url {}: {}", config.store.url, e))?;
    let api_key = config.api_key()?;

    Ok(Self {
      http: reqwest::Client::new(),
      base,
      api_key,
      access_token: Config::get_access_token(),
    })
  }

  /// URL of a table endpoint with the query encoded as parameters.
  fn table_url(&self, table: &str, params: &[(String, String)]) -> StoreResult<Url> {
    let mut url = self
      .base
      .join(&format!("rest/v1/{}", table))
      .map_err(|e| DataStoreError::request(format!("invalid table url: {}", e)))?;
    if !params.is_empty() {
      url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
    self
      .http
      .request(method, url)
      .header("apikey", &self.api_key)
      .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
  }

  async fn send(&self, builder: RequestBuilder) -> StoreResult<Response> {
    let response = builder
      .send()
      .await
      .map_err(|e| DataStoreError::request(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let api_error: ApiError = serde_json::from_str(&body).unwrap_or_default();
    let message = match (api_error.message, api_error.details) {
      (Some(m), Some(d)) => format!("{} ({})", m, d),
      (Some(m), None) => m,
      (None, _) if !body.is_empty() => body,
      (None, _) => status.to_string(),
    };
    Err(DataStoreError::from_provider(
      status.as_u16(),
      api_error.code.as_deref(),
      message,
    ))
  }

  async fn read_rows(response: Response) -> StoreResult<Vec<Value>> {
    let body = response
      .text()
      .await
      .map_err(|e| DataStoreError::request(e.to_string()))?;
    if body.trim().is_empty() {
      return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&body)?)
  }
}

/// Encode a list query as REST query parameters.
pub(super) fn select_params(query: &Select) -> Vec<(String, String)> {
  let mut params = vec![(
    "select".to_string(),
    query.columns.clone().unwrap_or_else(|| "*".to_string()),
  )];
  params.extend(filter_params(&query.filters));
  if let Some(order) = &query.order {
    let direction = if order.ascending { "asc" } else { "desc" };
    params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
  }
  if let Some(limit) = query.limit {
    params.push(("limit".to_string(), limit.to_string()));
  }
  params
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
  filters
    .iter()
    .map(|filter| match filter {
      Filter::Eq(column, value) => (column.clone(), format!("eq.{}", value)),
      Filter::Lt(column, value) => (column.clone(), format!("lt.{}", value)),
    })
    .collect()
}

#[async_trait]
impl DataStore for RestStore {
  async fn select(&self, table: &str, query: &Select) -> StoreResult<Vec<Value>> {
    let url = self.table_url(table, &select_params(query))?;
    tracing::debug!("GET {}", url);
    let response = self.send(self.request(Method::GET, url)).await?;
    Self::read_rows(response).await
  }

  async fn insert(&self, table: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
    let url = self.table_url(table, &[])?;
    let body = serde_json::to_vec(&rows)?;
    tracing::debug!("POST {} ({} rows)", url, rows.len());
    let builder = self
      .request(Method::POST, url)
      .header(header::CONTENT_TYPE, "application/json")
      .header("Prefer", "return=representation")
      .body(body);
    let response = self.send(builder).await?;
    Self::read_rows(response).await
  }

  async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> StoreResult<()> {
    let url = self.table_url(table, &filter_params(filters))?;
    tracing::debug!("PATCH {}", url);
    let builder = self
      .request(Method::PATCH, url)
      .header(header::CONTENT_TYPE, "application/json")
      .body(serde_json::to_vec(&patch)?);
    self.send(builder).await?;
    Ok(())
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<()> {
    let url = self.table_url(table, &filter_params(filters))?;
    tracing::debug!("DELETE {}", url);
    self.send(self.request(Method::DELETE, url)).await?;
    Ok(())
  }
}
