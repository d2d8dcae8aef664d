//! Session store: the current signed-in identity, published read-only.
//!
//! One `SessionStore` owns the state and is the only writer. Everything
//! else holds a `SessionReader`. Transitions are driven by provider events:
//! the initial session check, then sign-in and sign-out notifications.

mod provider;

pub use provider::{AuthError, IdentityProvider, RestIdentityProvider};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::cache::QueryCache;

/// Opaque user record from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
  /// Before the first session check has completed
  Unknown,
  Unauthenticated,
  Authenticated(Identity),
}

impl SessionState {
  pub fn identity(&self) -> Option<&Identity> {
    match self {
      Self::Authenticated(identity) => Some(identity),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
  /// Result of the startup session check
  InitialSession(Option<Identity>),
  /// The startup check itself failed; treated as signed out, never retried
  InitialCheckFailed,
  SignedIn(Identity),
  SignedOut,
}

/// Where the caller should go after a session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
  /// The unauthenticated landing view
  Login,
}

/// Single-writer owner of the session state.
pub struct SessionStore {
  tx: watch::Sender<SessionState>,
}

/// Read-only view of the session state.
#[derive(Clone)]
pub struct SessionReader {
  rx: watch::Receiver<SessionState>,
}

impl SessionStore {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(SessionState::Unknown);
    Self { tx }
  }

  pub fn reader(&self) -> SessionReader {
    SessionReader {
      rx: self.tx.subscribe(),
    }
  }

  pub fn state(&self) -> SessionState {
    self.tx.borrow().clone()
  }

  /// Apply a provider event. Returns whether the state changed.
  ///
  /// The initial-check events only count while the state is still unknown;
  /// a push notification that arrived first wins.
  pub fn apply(&self, event: SessionEvent) -> bool {
    self.tx.send_if_modified(|state| {
      let next = match (&*state, event) {
        (SessionState::Unknown, SessionEvent::InitialSession(Some(identity))) => {
          SessionState::Authenticated(identity)
        }
        (SessionState::Unknown, SessionEvent::InitialSession(None))
        | (SessionState::Unknown, SessionEvent::InitialCheckFailed) => SessionState::Unauthenticated,
        (_, SessionEvent::InitialSession(_)) | (_, SessionEvent::InitialCheckFailed) => {
          return false
        }
        (_, SessionEvent::SignedIn(identity)) => SessionState::Authenticated(identity),
        (_, SessionEvent::SignedOut) => SessionState::Unauthenticated,
      };
      if *state == next {
        return false;
      }
      tracing::info!("Session {:?} -> {:?}", state, next);
      *state = next;
      true
    })
  }

  /// Run the startup session check against the provider.
  pub async fn start(&self, provider: &dyn IdentityProvider) -> SessionState {
    let event = match provider.current_user().await {
      Ok(identity) => SessionEvent::InitialSession(identity),
      Err(e) => {
        tracing::warn!("Initial session check failed: {}", e);
        SessionEvent::InitialCheckFailed
      }
    };
    self.apply(event);
    self.state()
  }

  /// Sign out: end the provider session, wipe the cache and go to the login view.
  ///
  /// Local state is cleared even when the provider call fails; that failure
  /// is still returned so it can be reported.
  pub async fn sign_out(
    &self,
    provider: &dyn IdentityProvider,
    cache: &QueryCache,
  ) -> Result<Navigation, AuthError> {
    let result = provider.sign_out().await;

    if let Err(e) = cache.clear() {
      tracing::warn!("Failed to clear query cache on sign-out: {}", e);
    }
    self.apply(SessionEvent::SignedOut);

    result.map(|()| Navigation::Login)
  }
}

impl Default for SessionStore {
  fn default() -> Self {
    Self::new()
  }
}

impl SessionReader {
  pub fn current(&self) -> SessionState {
    self.rx.borrow().clone()
  }

  pub fn is_authenticated(&self) -> bool {
    matches!(*self.rx.borrow(), SessionState::Authenticated(_))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{QueryKey, SqliteStorage};
  use async_trait::async_trait;
  use url::Url;

  struct FakeProvider {
    user: Result<Option<Identity>, AuthError>,
    sign_out: Result<(), AuthError>,
  }

  #[async_trait]
  impl IdentityProvider for FakeProvider {
    async fn current_user(&self) -> Result<Option<Identity>, AuthError> {
      self.user.clone()
    }

    fn authorize_url(&self) -> Result<Url, AuthError> {
      Url::parse("https://id.example/authorize").map_err(|e| AuthError::Url(e.to_string()))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
      self.sign_out.clone()
    }
  }

  fn alice() -> Identity {
    Identity {
      id: "u-1".to_string(),
      email: Some("alice@example.com".to_string()),
    }
  }

  fn signed_in_provider() -> FakeProvider {
    FakeProvider {
      user: Ok(Some(alice())),
      sign_out: Ok(()),
    }
  }

  #[tokio::test]
  async fn test_initial_check() {
    let store = SessionStore::new();
    assert_eq!(store.state(), SessionState::Unknown);
    let state = store.start(&signed_in_provider()).await;
    assert_eq!(state, SessionState::Authenticated(alice()));
  }

  #[tokio::test]
  async fn test_failed_initial_check_means_signed_out() {
    let store = SessionStore::new();
    let provider = FakeProvider {
      user: Err(AuthError::Request("timeout".to_string())),
      sign_out: Ok(()),
    };
    assert_eq!(store.start(&provider).await, SessionState::Unauthenticated);
  }

  #[test]
  fn test_late_initial_session_is_ignored() {
    let store = SessionStore::new();
    assert!(store.apply(SessionEvent::SignedIn(alice())));
    assert!(!store.apply(SessionEvent::InitialSession(None)));
    assert_eq!(store.state(), SessionState::Authenticated(alice()));
  }

  #[test]
  fn test_reader_sees_transitions() {
    let store = SessionStore::new();
    let reader = store.reader();
    assert!(!reader.is_authenticated());

    store.apply(SessionEvent::SignedIn(alice()));
    assert_eq!(reader.current(), SessionState::Authenticated(alice()));
    assert!(reader.is_authenticated());

    store.apply(SessionEvent::SignedOut);
    assert_eq!(reader.current(), SessionState::Unauthenticated);
  }

  #[tokio::test]
  async fn test_sign_out_clears_persisted_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let cache = QueryCache::new(SqliteStorage::open(&path).unwrap());
    cache.fetch(QueryKey::Routines, || async { Ok(vec!["Push Day".to_string()]) }).await.unwrap();

    let store = SessionStore::new();
    store.start(&signed_in_provider()).await;
    let nav = store.sign_out(&signed_in_provider(), &cache).await.unwrap();
    assert_eq!(nav, Navigation::Login);
    assert_eq!(store.state(), SessionState::Unauthenticated);

    let reopened = QueryCache::new(SqliteStorage::open(&path).unwrap());
    assert_eq!(reopened.hydrate(), 0);
  }

  #[tokio::test]
  async fn test_sign_out_failure_still_clears_local_state() {
    let cache = QueryCache::new(crate::cache::NoopStorage);
    let provider = FakeProvider {
      user: Ok(Some(alice())),
      sign_out: Err(AuthError::Request("offline".to_string())),
    };
    let store = SessionStore::new();
    store.start(&provider).await;

    assert!(store.sign_out(&provider, &cache).await.is_err());
    assert_eq!(store.state(), SessionState::Unauthenticated);
  }
}
