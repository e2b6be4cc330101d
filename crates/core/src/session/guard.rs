//! Session expiration guard
//!
//! Marks the session expired and sends the user to the login surface. Safe
//! to call from any number of concurrently failing requests: markers are
//! rewritten idempotently, the notice is shown once and the redirect latch
//! is claimed with a compare-and-swap before navigation, so at most one
//! redirect happens for the lifetime of the guard.
//!
//! Failed navigations are counted in the session markers. While the
//! redirect back-off is paused the guard leaves the latch unclaimed and
//! does not navigate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use ecm_common::observability::log_recovery_event;
use ecm_domain::constants::{DEFAULT_LOGIN_PATH, REDIRECT_REASON_PARAM, SESSION_EXPIRED_NOTICE};
use ecm_domain::{InitStatus, RedirectReason};
use serde_json::json;
use tracing::{info, warn};

use super::markers::SessionMarkers;
use crate::ports::{Navigator, Notifier};

/// What a call to [`SessionExpirationGuard::mark_expired_and_redirect`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryAction {
    /// This call performed the redirect
    Redirected,
    /// Already on the login surface; markers set, no navigation
    AlreadyOnLogin,
    /// Another call already claimed the redirect
    AlreadyRedirecting,
    /// The redirect was claimed but navigation failed
    RedirectFailed,
    /// Too many recent failed redirects; navigation skipped until the cooldown ends
    RedirectPaused,
}

/// Marks expired sessions and performs the single login redirect
pub struct SessionExpirationGuard {
    markers: SessionMarkers,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    login_path: String,
    redirecting: AtomicBool,
    notified: AtomicBool,
}

impl SessionExpirationGuard {
    /// Guard redirecting to the default login path
    pub fn new(
        markers: SessionMarkers,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            markers,
            navigator,
            notifier,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            redirecting: AtomicBool::new(false),
            notified: AtomicBool::new(false),
        }
    }

    /// Override the login surface path
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Markers this guard writes
    pub fn markers(&self) -> &SessionMarkers {
        &self.markers
    }

    /// Whether the redirect latch has been claimed
    pub fn has_redirected(&self) -> bool {
        self.redirecting.load(Ordering::SeqCst)
    }

    /// Mark the session expired and redirect to login at most once
    pub fn mark_expired_and_redirect(&self) -> ExpiryAction {
        let pathname = self.navigator.current_path();
        log_recovery_event("api.session_expired.mark", json!({ "pathname": pathname }));

        self.write_markers();

        if !self.notified.swap(true, Ordering::SeqCst) {
            self.notifier.notify_error(SESSION_EXPIRED_NOTICE);
        }

        if is_login_path(&pathname, &self.login_path) {
            info!(pathname = %pathname, "session expired on login surface, skipping redirect");
            return ExpiryAction::AlreadyOnLogin;
        }

        match self.markers.auto_redirect_resumes_in(Utc::now()) {
            Ok(Some(resumes_in)) => {
                info!(?resumes_in, "automatic login redirect paused after repeated failures");
                return ExpiryAction::RedirectPaused;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "failed to read redirect failure markers"),
        }

        if self
            .redirecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return ExpiryAction::AlreadyRedirecting;
        }

        let reason = RedirectReason::SessionExpired.to_string();
        match self.navigator.redirect_to(&self.login_path, &[(REDIRECT_REASON_PARAM, &reason)]) {
            Ok(()) => {
                info!(from = %pathname, to = %self.login_path, "redirecting to login after session expiry");
                ExpiryAction::Redirected
            }
            Err(err) => {
                warn!(error = %err, "login redirect failed");
                if let Err(err) = self.markers.set_init_status(InitStatus::RedirectFailed) {
                    warn!(error = %err, "failed to record redirect failure");
                }
                match self.markers.record_redirect_failure(Utc::now()) {
                    Ok(count) => info!(count, "recorded failed login redirect"),
                    Err(err) => warn!(error = %err, "failed to count redirect failure"),
                }
                ExpiryAction::RedirectFailed
            }
        }
    }

    /// Success hook: a completed request means the session is usable again
    ///
    /// Clears the `session_expired` init status. The redirect latch stays
    /// claimed.
    pub fn on_request_succeeded(&self) {
        match self.markers.init_status() {
            Ok(Some(InitStatus::SessionExpired)) => {
                if let Err(err) = self.markers.clear_init_status(false) {
                    warn!(error = %err, "failed to clear session expired marker");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to read init status"),
        }
    }

    fn write_markers(&self) {
        let results = [
            self.write_expired_status(),
            self.markers.set_redirect_reason(RedirectReason::SessionExpired),
            self.markers.clear_credential(),
        ];
        for err in results.into_iter().filter_map(Result::err) {
            warn!(error = %err, "failed to update session markers");
        }
    }

    /// A `redirect_failed` status from this guard's own redirect stays visible
    fn write_expired_status(&self) -> ecm_domain::Result<()> {
        let own_failure = self.has_redirected()
            && self.markers.init_status()? == Some(InitStatus::RedirectFailed);
        if own_failure {
            return Ok(());
        }
        self.markers.set_init_status(InitStatus::SessionExpired)
    }
}

fn is_login_path(pathname: &str, login_path: &str) -> bool {
    let trimmed = pathname.trim_end_matches('/');
    trimmed == login_path.trim_end_matches('/')
}
