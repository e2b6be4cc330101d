//! Single-flight token refresh
//!
//! Every refresh in the process goes through one [`TokenRefreshCoordinator`].
//! Concurrent callers share one in-flight refresh and observe the same
//! settled outcome; the next caller after settlement starts a new one.

use std::sync::Arc;

use ecm_common::resilience::SingleFlight;
use ecm_domain::TokenClaims;
use tracing::{debug, instrument, warn};

use super::errors::RefreshError;
use crate::ports::IdentityClient;

/// Outcome shared by every caller of one refresh
pub type RefreshOutcome = Result<Option<String>, RefreshError>;

/// Deduplicates concurrent token refreshes
pub struct TokenRefreshCoordinator {
    identity: Arc<dyn IdentityClient>,
    flight: SingleFlight<RefreshOutcome>,
}

impl TokenRefreshCoordinator {
    /// Coordinator over `identity` with no refresh in flight
    pub fn new(identity: Arc<dyn IdentityClient>) -> Self {
        Self { identity, flight: SingleFlight::new() }
    }

    /// Refresh the token, joining any refresh already in flight
    #[instrument(skip(self), level = "debug")]
    pub async fn refresh(&self) -> RefreshOutcome {
        let identity = Arc::clone(&self.identity);
        let outcome = self.flight.run(move || async move { identity.refresh().await }).await;

        match &outcome {
            Ok(token) => debug!(refreshed = token.is_some(), "token refresh settled"),
            Err(err) => warn!(
                error = %err,
                status = ?err.status,
                terminal = err.should_logout(),
                "token refresh failed"
            ),
        }
        outcome
    }

    /// Token currently held by the identity client
    pub fn current_token(&self) -> Option<String> {
        self.identity.token()
    }

    /// Decoded claims of the current token
    pub fn current_claims(&self) -> Option<TokenClaims> {
        self.identity.claims()
    }

    /// Whether a refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.flight.is_in_flight()
    }

    /// Number of underlying refresh operations started so far
    pub fn refresh_count(&self) -> u64 {
        self.flight.started()
    }

    /// Underlying identity client
    pub fn identity(&self) -> &Arc<dyn IdentityClient> {
        &self.identity
    }
}
