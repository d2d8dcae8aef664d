use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, StatusCode};
use thiserror::Error;
use url::Url;

use super::Identity;
use crate::config::Config;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
  #[error("identity provider unreachable: {0}")]
  Request(String),

  #[error("identity provider returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("invalid identity provider url: {0}")]
  Url(String),
}

/// External identity provider. Sign-in itself happens in the provider's
/// consent flow; this side only builds its entry URL and observes the result.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
  /// The signed-in user, or `None` without a valid session.
  async fn current_user(&self) -> Result<Option<Identity>, AuthError>;

  /// Where to send the user to start the OAuth consent flow.
  fn authorize_url(&self) -> Result<Url, AuthError>;

  /// End the provider-side session.
  async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Identity provider reached over the hosted auth REST endpoints.
pub struct RestIdentityProvider {
  http: reqwest::Client,
  base: Url,
  api_key: String,
  access_token: Option<String>,
  provider: String,
  redirect_to: String,
}

impl RestIdentityProvider {
  pub fn new(config: &Config) -> color_eyre::Result<Self> {
    let base = Url::parse(&config.store.url)
      .map_err(|e| color_eyre::eyre::eyre!("Invalid store url {}: {}", config.store.url, e))?;

    Ok(Self {
      http: reqwest::Client::new(),
      base,
      api_key: config.api_key()?,
      access_token: Config::get_access_token(),
      provider: config.auth.provider.clone(),
      redirect_to: config.auth.redirect_to.clone(),
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
    self
      .base
      .join(&format!("auth/v1/{}", path))
      .map_err(|e| AuthError::Url(e.to_string()))
  }

  fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
    self
      .http
      .request(method, url)
      .header("apikey", &self.api_key)
      .header(header::AUTHORIZATION, format!("Bearer {}", token))
  }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
  async fn current_user(&self) -> Result<Option<Identity>, AuthError> {
    let Some(token) = &self.access_token else {
      return Ok(None);
    };

    let response = self
      .request(Method::GET, self.endpoint("user")?, token)
      .send()
      .await
      .map_err(|e| AuthError::Request(e.to_string()))?;

    match response.status() {
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
      status if status.is_success() => {
        let body = response
          .text()
          .await
          .map_err(|e| AuthError::Request(e.to_string()))?;
        let identity: Identity =
          serde_json::from_str(&body).map_err(|e| AuthError::Request(e.to_string()))?;
        Ok(Some(identity))
      }
      status => Err(AuthError::Status {
        status: status.as_u16(),
        message: response.text().await.unwrap_or_default(),
      }),
    }
  }

  fn authorize_url(&self) -> Result<Url, AuthError> {
    let mut url = self.endpoint("authorize")?;
    url
      .query_pairs_mut()
      .append_pair("provider", &self.provider)
      .append_pair("redirect_to", &self.redirect_to);
    Ok(url)
  }

  async fn sign_out(&self) -> Result<(), AuthError> {
    let Some(token) = &self.access_token else {
      return Ok(());
    };

    let response = self
      .request(Method::POST, self.endpoint("logout")?, token)
      .send()
      .await
      .map_err(|e| AuthError::Request(e.to_string()))?;

    let status = response.status();
    if status.is_success() || status == StatusCode::UNAUTHORIZED {
      tracing::info!("Provider session ended");
      return Ok(());
    }
    Err(AuthError::Status {
      status: status.as_u16(),
      message: response.text().await.unwrap_or_default(),
    })
  }
}
