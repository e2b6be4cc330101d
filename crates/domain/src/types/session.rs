//! Session marker types

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Lifetime of a stored marker
///
/// `Session` markers live as long as the current client session; `Persistent`
/// markers survive restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    Session,
    Persistent,
}

/// Outcome recorded by auth initialization or session expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStatus {
    Timeout,
    Error,
    RedirectFailed,
    SessionExpired,
}

impl_domain_status_conversions!(InitStatus {
    Timeout => "timeout",
    Error => "error",
    RedirectFailed => "redirect_failed",
    SessionExpired => "session_expired",
});

/// Reason attached to a redirect to the login surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    SessionExpired,
}

impl_domain_status_conversions!(RedirectReason {
    SessionExpired => "session_expired",
});

/// Username and password for a direct backend login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}
