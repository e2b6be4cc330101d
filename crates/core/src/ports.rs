//! Port interfaces for the resilience layer
//!
//! These traits define the boundaries between the recovery logic and the
//! identity provider, HTTP transport, marker storage and UI collaborators.

use async_trait::async_trait;
use ecm_domain::{
    Credentials, ErrorEnvelope, HttpResponse, RequestDescriptor, Result, StorageScope,
    TokenClaims,
};

use crate::auth::RefreshError;

/// Identity provider client
///
/// Owns the current bearer token. The resilience layer only writes it
/// through [`IdentityClient::refresh`], reached via the refresh coordinator.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Obtain a fresh token
    ///
    /// `Ok(None)` means no refresh was possible (no session) without a
    /// failure to report.
    async fn refresh(&self) -> std::result::Result<Option<String>, RefreshError>;

    /// Current bearer token, if any
    fn token(&self) -> Option<String>;

    /// Decoded claims of the current token
    fn claims(&self) -> Option<TokenClaims>;

    async fn login(&self, credentials: &Credentials) -> Result<()>;

    async fn logout(&self) -> Result<()>;
}

/// Sends one request attempt
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request`, mapping every non-2xx outcome to an [`ErrorEnvelope`]
    async fn send(
        &self,
        request: &RequestDescriptor,
    ) -> std::result::Result<HttpResponse, ErrorEnvelope>;
}

/// Scoped key/value storage for session markers
pub trait SessionStore: Send + Sync {
    fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>>;

    fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()>;

    fn remove(&self, scope: StorageScope, key: &str) -> Result<()>;
}

/// Navigation surface of the client
pub trait Navigator: Send + Sync {
    /// Navigate to `path` with the given query parameters
    fn redirect_to(&self, path: &str, params: &[(&str, &str)]) -> Result<()>;

    fn current_path(&self) -> String;
}

/// Fire-and-forget user notification sink
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}
