//! Backend session management.
//!
//! A [`Session`] is the `(api_key, user_id)` pair issued by the media
//! backend's username/password exchange. [`SessionProvider`] caches it and
//! serializes refreshes so concurrent callers trigger at most one login.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AuthError, TransportError};
use crate::http_client::FetchClient;

/// Username that may log in without a password.
pub const GUEST_USERNAME: &str = "demo";

const CLIENT_NAME: &str = "streamsift";
const DEVICE_NAME: &str = "streamsift-cli";

/// Credentials issued by the backend. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub api_key: String,
    pub user_id: String,
}

impl Session {
    pub fn new(api_key: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            user_id: user_id.into(),
        }
    }
}

/// Credential exchange.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticateRequest<'a> {
    username: &'a str,
    pw: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticateResponse {
    access_token: String,
    user: AuthenticatedUser,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticatedUser {
    id: String,
}

/// Jellyfin `AuthenticateByName` exchange.
pub struct JellyfinAuthenticator {
    client: FetchClient,
    host: String,
    device_id: String,
}

impl JellyfinAuthenticator {
    pub fn new(client: FetchClient, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            device_id: Uuid::new_v4().to_string(),
        }
    }

    /// Value of the `X-Emby-Authorization` header.
    pub fn authorization(&self) -> String {
        format!(
            "MediaBrowser Client=\"{CLIENT_NAME}\", Device=\"{DEVICE_NAME}\", DeviceId=\"{}\", Version=\"{}\"",
            self.device_id,
            crate::VERSION
        )
    }
}

#[async_trait]
impl Authenticator for JellyfinAuthenticator {
    async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let url = format!("{}/Users/AuthenticateByName", self.host);
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Emby-Authorization",
            HeaderValue::from_str(&self.authorization())
                .map_err(|_| AuthError::InvalidCredentials)?,
        );

        let body = AuthenticateRequest {
            username,
            pw: password,
        };
        let response: AuthenticateResponse = match self.client.post_json(&url, &body, headers).await
        {
            Ok(response) => response,
            Err(TransportError::Status {
                status: 401 | 403, ..
            }) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        info!("Logged in as user {}", response.user.id);
        Ok(Session::new(response.access_token, response.user.id))
    }
}

/// Cached session with single-flight refresh.
pub struct SessionProvider<A> {
    authenticator: A,
    username: String,
    password: String,
    session: RwLock<Option<Session>>,
    refresh: Mutex<()>,
}

impl<A: Authenticator> SessionProvider<A> {
    pub fn new(authenticator: A, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            authenticator,
            username: username.into(),
            password: password.into(),
            session: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Start from a previously issued session.
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = RwLock::new(Some(session));
        self
    }

    /// Cached session, if any.
    pub async fn current(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    fn has_credentials(&self) -> bool {
        self.username == GUEST_USERNAME || !(self.username.is_empty() || self.password.is_empty())
    }

    /// Return the cached session, logging in when there is none or when
    /// `force` is set.
    ///
    /// A failed login leaves the previous session in place.
    pub async fn ensure_authenticated(&self, force: bool) -> Result<Session, AuthError> {
        if !force {
            if let Some(session) = self.current().await {
                return Ok(session);
            }
        }
        if !self.has_credentials() {
            return Err(AuthError::MissingCredentials);
        }

        let _guard = self.refresh.lock().await;
        if !force {
            // Another caller may have logged in while we waited
            if let Some(session) = self.current().await {
                return Ok(session);
            }
        }

        debug!("Logging in as {}", self.username);
        let session = self
            .authenticator
            .login(&self.username, &self.password)
            .await
            .inspect_err(|e| warn!("Login failed: {}", e))?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Counts logins; issues `key-N` on the N-th call.
    #[derive(Default)]
    struct CountingAuthenticator {
        calls: Arc<AtomicUsize>,
        reject: Arc<AtomicBool>,
        delay_ms: u64,
    }

    #[async_trait]
    impl Authenticator for CountingAuthenticator {
        async fn login(&self, _username: &str, _password: &str) -> Result<Session, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.reject.load(Ordering::SeqCst) {
                return Err(AuthError::InvalidCredentials);
            }
            Ok(Session::new(format!("key-{n}"), "user"))
        }
    }

    fn provider(auth: CountingAuthenticator) -> SessionProvider<CountingAuthenticator> {
        SessionProvider::new(auth, "alice", "secret")
    }

    #[tokio::test]
    async fn cached_session_skips_login() {
        let auth = CountingAuthenticator::default();
        let calls = Arc::clone(&auth.calls);
        let provider = provider(auth);

        let first = provider.ensure_authenticated(false).await.unwrap();
        let second = provider.ensure_authenticated(false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_always_logs_in() {
        let auth = CountingAuthenticator::default();
        let calls = Arc::clone(&auth.calls);
        let provider = provider(auth);

        provider.ensure_authenticated(false).await.unwrap();
        let refreshed = provider.ensure_authenticated(true).await.unwrap();
        assert_eq!(refreshed.api_key, "key-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_session() {
        let auth = CountingAuthenticator::default();
        let reject = Arc::clone(&auth.reject);
        let provider = provider(auth);

        let original = provider.ensure_authenticated(false).await.unwrap();
        reject.store(true, Ordering::SeqCst);
        let err = provider.ensure_authenticated(true).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(provider.current().await, Some(original));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_login() {
        let auth = CountingAuthenticator::default();
        let calls = Arc::clone(&auth.calls);
        let provider = SessionProvider::new(auth, "alice", "");

        let err = provider.ensure_authenticated(false).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn guest_user_needs_no_password() {
        let provider = SessionProvider::new(CountingAuthenticator::default(), GUEST_USERNAME, "");
        assert!(provider.ensure_authenticated(false).await.is_ok());
    }

    #[tokio::test]
    async fn seeded_session_is_used_without_credentials() {
        let auth = CountingAuthenticator::default();
        let calls = Arc::clone(&auth.calls);
        let provider =
            SessionProvider::new(auth, "", "").with_session(Session::new("stored", "u1"));

        let session = provider.ensure_authenticated(false).await.unwrap();
        assert_eq!(session.api_key, "stored");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_login() {
        let auth = CountingAuthenticator {
            delay_ms: 30,
            ..CountingAuthenticator::default()
        };
        let calls = Arc::clone(&auth.calls);
        let provider = provider(auth);

        let (a, b, c) = tokio::join!(
            provider.ensure_authenticated(false),
            provider.ensure_authenticated(false),
            provider.ensure_authenticated(false),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(c.unwrap().api_key, "key-1");
    }

    #[tokio::test]
    async fn jellyfin_exchange_parses_token_and_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Users/AuthenticateByName"))
            .and(header_exists("x-emby-authorization"))
            .and(body_json(serde_json::json!({"Username": "alice", "Pw": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "AccessToken": "tok-123",
                "User": {"Id": "uid-9", "Name": "alice"}
            })))
            .mount(&server)
            .await;

        let auth = JellyfinAuthenticator::new(FetchClient::new().unwrap(), server.uri());
        let session = auth.login("alice", "secret").await.unwrap();
        assert_eq!(session, Session::new("tok-123", "uid-9"));
    }

    #[tokio::test]
    async fn jellyfin_rejection_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let auth = JellyfinAuthenticator::new(FetchClient::new().unwrap(), server.uri());
        let err = auth.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn authorization_header_names_device() {
        let auth = JellyfinAuthenticator::new(FetchClient::new().unwrap(), "http://h/");
        let value = auth.authorization();
        assert!(value.starts_with("MediaBrowser Client=\"streamsift\""));
        assert!(value.contains(&format!("DeviceId=\"{}\"", auth.device_id)));
    }
}
