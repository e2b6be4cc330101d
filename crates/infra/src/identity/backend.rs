//! Identity client for the REST backend
//!
//! The backend issues bearer tokens from `/auth/login` and rotates them on
//! the refresh endpoint. The current token is kept in the persistent scope
//! of the session store so the session expiration guard can clear it.
//!
//! Requests here go straight to the transport. Routing them through the
//! resilient pipeline would make the refresh call wait on itself.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecm_core::auth::RefreshError;
use ecm_core::ports::{IdentityClient, SessionStore, Transport};
use ecm_domain::constants::{TOKEN_KEY, USER_KEY};
use ecm_domain::{
    AuthConfig, Credentials, EcmError, ErrorEnvelope, RequestDescriptor, Result, StorageScope,
    TokenClaims,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

/// Login endpoint, relative to the base URL
pub const LOGIN_PATH: &str = "/auth/login";
/// Logout endpoint, relative to the base URL
pub const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    user: Option<Value>,
}

/// Identity client talking to the ECM backend auth endpoints
pub struct BackendIdentityClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    config: AuthConfig,
}

impl BackendIdentityClient {
    /// Client persisting tokens in `store`
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        config: AuthConfig,
    ) -> Self {
        Self { transport, store, config }
    }

    /// Profile returned by the last login, if any
    pub fn user(&self) -> Option<Value> {
        self.stored(USER_KEY).and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Whether a token is held
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    fn stored(&self, key: &str) -> Option<String> {
        match self.store.get(StorageScope::Persistent, key) {
            Ok(value) => value.filter(|value| !value.is_empty()),
            Err(err) => {
                warn!(key, error = %err, "failed to read session store");
                None
            }
        }
    }

    /// Whether `token` is inside the refresh threshold at `now`
    ///
    /// Opaque tokens without readable claims are always refreshed.
    fn needs_refresh(&self, token: &str, now: DateTime<Utc>) -> bool {
        TokenClaims::decode(token)
            .map_or(true, |claims| claims.expires_within(self.config.refresh_threshold_seconds, now))
    }
}

#[async_trait]
impl IdentityClient for BackendIdentityClient {
    #[instrument(skip(self))]
    async fn refresh(&self) -> std::result::Result<Option<String>, RefreshError> {
        let Some(current) = self.token() else {
            debug!("no stored token, skipping refresh");
            return Ok(None);
        };
        if !self.needs_refresh(&current, Utc::now()) {
            debug!("token outside refresh threshold, skipping refresh");
            return Ok(Some(current));
        }

        let mut request = RequestDescriptor::post(&self.config.refresh_path);
        request.set_bearer(&current);

        let response = self.transport.send(&request).await.map_err(refresh_failure)?;
        let body: TokenResponse = response.json().map_err(|err| {
            RefreshError::new(format!("invalid refresh response: {err}")).with_status(response.status)
        })?;

        self.store
            .set(StorageScope::Persistent, TOKEN_KEY, &body.token)
            .map_err(|err| RefreshError::new(format!("failed to store refreshed token: {err}")))?;

        info!("access token refreshed");
        Ok(Some(body.token))
    }

    fn token(&self) -> Option<String> {
        self.stored(TOKEN_KEY)
    }

    fn claims(&self) -> Option<TokenClaims> {
        self.token().and_then(|token| TokenClaims::decode(&token).ok())
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn login(&self, credentials: &Credentials) -> Result<()> {
        let request = RequestDescriptor::post(LOGIN_PATH).with_json(json!({
            "username": credentials.username,
            "password": credentials.password,
        }));

        let response = self.transport.send(&request).await.map_err(|envelope| {
            warn!(error = %envelope, "login failed");
            EcmError::Auth(login_failure_message(&envelope))
        })?;
        let body: LoginResponse = response.json()?;

        self.store.set(StorageScope::Persistent, TOKEN_KEY, &body.token)?;
        match body.user {
            Some(user) => self.store.set(StorageScope::Persistent, USER_KEY, &user.to_string())?,
            None => self.store.remove(StorageScope::Persistent, USER_KEY)?,
        }

        info!("login succeeded");
        Ok(())
    }

    /// End the session on the backend, then forget the local credential
    ///
    /// The backend call is best-effort; local state is cleared regardless.
    #[instrument(skip(self))]
    async fn logout(&self) -> Result<()> {
        if let Some(token) = self.token() {
            let mut request = RequestDescriptor::post(LOGOUT_PATH);
            request.set_bearer(&token);
            if let Err(err) = self.transport.send(&request).await {
                warn!(error = %err, "backend logout failed, clearing local session anyway");
            }
        }

        self.store.remove(StorageScope::Persistent, TOKEN_KEY)?;
        self.store.remove(StorageScope::Persistent, USER_KEY)?;
        info!("logged out");
        Ok(())
    }
}

/// Map a failed refresh response onto a [`RefreshError`]
///
/// 401/403 carry their status, and the body's `error` code when present, so
/// they classify as terminal. Timeouts, network failures and 5xx stay
/// transient.
fn refresh_failure(envelope: ErrorEnvelope) -> RefreshError {
    if envelope.is_timeout() {
        return RefreshError::timeout(envelope.message);
    }
    if envelope.status.is_none() {
        return RefreshError::network(envelope.message);
    }

    let message = envelope.server_message().unwrap_or(&envelope.message).to_string();
    let code = envelope.response_error().map(str::to_string);
    let mut error = RefreshError::new(message);
    if let Some(status) = envelope.status {
        error = error.with_status(status);
    }
    if let Some(code) = code {
        error = error.with_code(code);
    }
    error
}

fn login_failure_message(envelope: &ErrorEnvelope) -> String {
    envelope.server_message().unwrap_or(&envelope.message).to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use ecm_core::auth::errors::INVALID_GRANT;
    use ecm_core::session::MemorySessionStore;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::HttpTransport;

    fn jwt_expiring_in(seconds: i64) -> String {
        let payload = json!({ "exp": Utc::now().timestamp() + seconds, "sid": "s-1" });
        format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(payload.to_string()))
    }

    fn client_for(server: &MockServer) -> (Arc<MemorySessionStore>, BackendIdentityClient) {
        let transport =
            HttpTransport::builder().base_url(format!("{}/api", server.uri())).build().unwrap();
        let store = Arc::new(MemorySessionStore::new());
        let client =
            BackendIdentityClient::new(Arc::new(transport), store.clone(), AuthConfig::default());
        (store, client)
    }

    #[tokio::test]
    async fn refresh_without_token_is_a_no_op() {
        let server = MockServer::start().await;
        let (_, client) = client_for(&server);

        assert_eq!(client.refresh().await, Ok(None));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fresh_token_skips_the_network() {
        let server = MockServer::start().await;
        let (store, client) = client_for(&server);
        let token = jwt_expiring_in(3_600);
        store.set(StorageScope::Persistent, TOKEN_KEY, &token).unwrap();

        assert_eq!(client.refresh().await, Ok(Some(token)));
        assert!(server.received_requests().await.unwrap().is_empty());
        assert_eq!(client.claims().and_then(|c| c.sid).as_deref(), Some("s-1"));
    }

    /// Validates the proactive refresh scenario.
    ///
    /// Assertions:
    /// - A token inside the threshold is sent as bearer to the refresh path
    /// - The rotated token is persisted and returned
    #[tokio::test]
    async fn expiring_token_is_rotated() {
        let server = MockServer::start().await;
        let (store, client) = client_for(&server);
        let expiring = jwt_expiring_in(5);
        store.set(StorageScope::Persistent, TOKEN_KEY, &expiring).unwrap();

        Mock::given(method("POST"))
            .and(path("/api/auth/refresh"))
            .and(header("authorization", format!("Bearer {expiring}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "rotated" })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client.refresh().await, Ok(Some("rotated".to_string())));
        assert_eq!(client.token().as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn rejected_refresh_is_terminal() {
        let server = MockServer::start().await;
        let (store, client) = client_for(&server);
        store.set(StorageScope::Persistent, TOKEN_KEY, "opaque").unwrap();

        Mock::given(method("POST"))
            .and(path("/api/auth/refresh"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                json!({ "error": "invalid_grant", "message": "Session not active" }),
            ))
            .mount(&server)
            .await;

        let err = client.refresh().await.unwrap_err();
        assert_eq!(err.status, Some(400));
        assert_eq!(err.code.as_deref(), Some(INVALID_GRANT));
        assert_eq!(err.message, "Session not active");
        assert!(err.should_logout());
    }

    #[tokio::test]
    async fn unauthorized_refresh_is_terminal() {
        let server = MockServer::start().await;
        let (store, client) = client_for(&server);
        store.set(StorageScope::Persistent, TOKEN_KEY, "opaque").unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client.refresh().await.unwrap_err();
        assert_eq!(err.status, Some(401));
        assert!(err.should_logout());
    }

    #[tokio::test]
    async fn server_errors_and_timeouts_stay_transient() {
        let server = MockServer::start().await;
        let (store, client) = client_for(&server);
        store.set(StorageScope::Persistent, TOKEN_KEY, "opaque").unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        let err = client.refresh().await.unwrap_err();
        assert_eq!(err.status, Some(503));
        assert!(!err.should_logout());

        let transport = HttpTransport::builder()
            .base_url(format!("{}/api", server.uri()))
            .timeouts(ecm_domain::TimeoutBudgets { write_ms: 30, ..Default::default() })
            .build()
            .unwrap();
        let slow_client =
            BackendIdentityClient::new(Arc::new(transport), store.clone(), AuthConfig::default());
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let err = slow_client.refresh().await.unwrap_err();
        assert!(!err.should_logout());
        assert_eq!(client.token().as_deref(), Some("opaque"));
    }

    #[tokio::test]
    async fn login_persists_token_and_user() {
        let server = MockServer::start().await;
        let (_, client) = client_for(&server);

        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({ "username": "alice", "password": "secret" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "token": "issued", "user": { "username": "alice" } }),
            ))
            .mount(&server)
            .await;

        client.login(&Credentials::new("alice", "secret")).await.unwrap();

        assert_eq!(client.token().as_deref(), Some("issued"));
        assert_eq!(client.user(), Some(json!({ "username": "alice" })));
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn failed_login_reports_server_message() {
        let server = MockServer::start().await;
        let (_, client) = client_for(&server);

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
            )
            .mount(&server)
            .await;

        let err = client.login(&Credentials::new("alice", "wrong")).await.unwrap_err();
        assert_eq!(err, EcmError::Auth("Bad credentials".into()));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_local_state_when_backend_fails() {
        let server = MockServer::start().await;
        let (store, client) = client_for(&server);
        store.set(StorageScope::Persistent, TOKEN_KEY, "issued").unwrap();
        store.set(StorageScope::Persistent, USER_KEY, "{}").unwrap();

        Mock::given(method("POST"))
            .and(path("/api/auth/logout"))
            .and(header("authorization", "Bearer issued"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        client.logout().await.unwrap();

        assert_eq!(client.token(), None);
        assert_eq!(client.user(), None);
    }
}
