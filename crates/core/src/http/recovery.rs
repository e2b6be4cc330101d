//! Response recovery state machine
//!
//! ```text
//! SENT ─┬─ 2xx ──────────────────────────────────────────► SUCCESS
//!       ├─ 401 ─────── not retried for auth ─ refresh, resend once
//!       │              already retried ─────► session guard, propagate
//!       ├─ timeout ─── not retried for timeout ─ resend once
//!       │              already retried ─────► timeout notice, propagate
//!       ├─ cancelled ────────────────────────────────────► propagate as is
//!       └─ other ─── auth retry ───────────────────────► propagate
//!                    first attempt ────────────► notice, propagate
//! ```
//!
//! Each failure class has a retry budget of one per logical request. The
//! budget travels in the descriptor's [`RetryContext`](ecm_domain::RetryContext);
//! retried attempts are derived copies with the marker set.

use std::sync::Arc;

use ecm_common::observability::log_recovery_event;
use ecm_domain::constants::{GENERIC_FAILURE_NOTICE, TIMEOUT_NOTICE};
use ecm_domain::{ErrorEnvelope, FailureClass, HttpResponse, RequestDescriptor};
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::TokenRefreshCoordinator;
use crate::ports::Notifier;
use crate::session::SessionExpirationGuard;

/// Result of one request attempt
pub type Attempt = Result<HttpResponse, ErrorEnvelope>;

/// State of one request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Handed to the transport, outcome pending
    Sent,
    Success,
    AuthFailure,
    TimeoutFailure,
    OtherFailure,
    /// Cancelled by the caller; bypasses recovery
    Cancelled,
}

impl RecoveryState {
    /// Settled state of a completed attempt
    pub fn of_attempt(attempt: &Attempt) -> Self {
        match attempt {
            Ok(_) => Self::Success,
            Err(error) => Self::of_failure(error),
        }
    }

    /// Classify a failed attempt
    pub fn of_failure(error: &ErrorEnvelope) -> Self {
        if error.is_cancelled() {
            Self::Cancelled
        } else if error.is_unauthorized() {
            Self::AuthFailure
        } else if error.is_timeout() {
            Self::TimeoutFailure
        } else {
            Self::OtherFailure
        }
    }
}

/// Applies the per-request retry budgets to failed attempts
pub struct ResponseRecoveryStateMachine {
    coordinator: Arc<TokenRefreshCoordinator>,
    guard: Arc<SessionExpirationGuard>,
    notifier: Arc<dyn Notifier>,
}

impl ResponseRecoveryStateMachine {
    /// Machine refreshing through `coordinator` and ending sessions through `guard`
    pub fn new(
        coordinator: Arc<TokenRefreshCoordinator>,
        guard: Arc<SessionExpirationGuard>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { coordinator, guard, notifier }
    }

    /// Recover from a failed attempt
    ///
    /// `last_dispatched` stands in for the descriptor when the envelope lost
    /// it. `resend` dispatches a derived attempt; its own failures run
    /// through this machine again, bounded by the retry markers.
    pub async fn recover<'a, F>(
        &self,
        error: ErrorEnvelope,
        last_dispatched: Option<RequestDescriptor>,
        resend: F,
    ) -> Attempt
    where
        F: Fn(RequestDescriptor) -> BoxFuture<'a, Attempt> + Send + Sync,
    {
        let state = RecoveryState::of_failure(&error);
        let request = resolve_request(&error, last_dispatched);
        debug!(
            ?state,
            status = ?error.status,
            code = ?error.code,
            url = request.as_ref().map(|r| r.url.as_str()),
            "request failed"
        );

        match state {
            RecoveryState::Cancelled => Err(error),
            RecoveryState::AuthFailure => self.recover_auth(error, request, resend).await,
            RecoveryState::TimeoutFailure => self.recover_timeout(error, request, resend).await,
            _ if request.as_ref().is_some_and(|r| r.retry.has_retried(FailureClass::Auth)) => {
                debug!(status = ?error.status, "auth retry failed, session expiry reports it");
                Err(error)
            }
            _ => {
                self.notify_other(&error);
                Err(error)
            }
        }
    }

    async fn recover_auth<'a, F>(
        &self,
        error: ErrorEnvelope,
        request: Option<RequestDescriptor>,
        resend: F,
    ) -> Attempt
    where
        F: Fn(RequestDescriptor) -> BoxFuture<'a, Attempt> + Send + Sync,
    {
        let Some(request) = request.filter(|r| !r.retry.has_retried(FailureClass::Auth)) else {
            self.guard.mark_expired_and_redirect();
            return Err(error);
        };

        let mut retry = request.derive_retry(FailureClass::Auth);
        let token = match self.coordinator.refresh().await {
            Ok(refreshed) => refreshed.or_else(|| self.coordinator.current_token()),
            Err(err) if err.should_logout() => {
                warn!(error = %err, url = %request.url, "refresh rejected, ending session");
                self.guard.mark_expired_and_redirect();
                return Err(error);
            }
            Err(err) => {
                warn!(error = %err, url = %request.url, "refresh failed transiently, retrying with current token");
                self.coordinator.current_token()
            }
        };
        if let Some(token) = token {
            retry.set_bearer(&token);
        }

        let payload = json!({
            "method": retry.method.as_str(),
            "url": retry.url,
            "retryAuth": true,
            "hasToken": retry.authorization().is_some(),
        });

        match resend(retry).await {
            Ok(response) => {
                info!(url = %request.url, "request recovered after token refresh");
                log_recovery_event("api.response.401.retry.success", payload);
                Ok(response)
            }
            Err(retry_error) if retry_error.is_cancelled() || retry_error.is_timeout() => {
                Err(retry_error)
            }
            Err(retry_error) => {
                warn!(url = %request.url, status = ?retry_error.status, "auth retry failed");
                log_recovery_event("api.response.401.retry.failed", payload);
                self.guard.mark_expired_and_redirect();
                Err(error)
            }
        }
    }

    async fn recover_timeout<'a, F>(
        &self,
        error: ErrorEnvelope,
        request: Option<RequestDescriptor>,
        resend: F,
    ) -> Attempt
    where
        F: Fn(RequestDescriptor) -> BoxFuture<'a, Attempt> + Send + Sync,
    {
        let Some(request) = request.filter(|r| !r.retry.has_retried(FailureClass::Timeout)) else {
            warn!(code = ?error.code, "request timed out after retry");
            self.notifier.notify_error(TIMEOUT_NOTICE);
            return Err(error);
        };

        let retry = request.derive_retry(FailureClass::Timeout);
        log_recovery_event(
            "api.response.timeout.retry",
            json!({ "method": retry.method.as_str(), "url": retry.url }),
        );
        resend(retry).await
    }

    fn notify_other(&self, error: &ErrorEnvelope) {
        let message = error.server_message().unwrap_or(GENERIC_FAILURE_NOTICE);
        self.notifier.notify_error(message);
    }
}

/// Recover the descriptor of a failed attempt
///
/// Order: the envelope's own descriptor, a GET rebuilt from the response
/// URL, then the last dispatched attempt. A rebuilt descriptor inherits the
/// retry markers of the last dispatched attempt to the same URL.
fn resolve_request(
    error: &ErrorEnvelope,
    last_dispatched: Option<RequestDescriptor>,
) -> Option<RequestDescriptor> {
    if let Some(request) = &error.request {
        return Some(request.clone());
    }

    if let Some(url) = error.response_url.as_deref().filter(|url| !url.is_empty()) {
        let mut rebuilt = RequestDescriptor::get(url);
        if let Some(previous) = last_dispatched.as_ref().filter(|previous| previous.url == url) {
            rebuilt.retry = previous.retry;
            rebuilt.cancellation.clone_from(&previous.cancellation);
        }
        return Some(rebuilt);
    }

    last_dispatched
}
