//! Typed access to session markers
//!
//! | Key                                   | Scope      | Value                      |
//! |---------------------------------------|------------|----------------------------|
//! | `ecm_auth_init_status`                | session    | [`InitStatus`]             |
//! | `ecm_auth_redirect_reason`            | persistent | [`RedirectReason`]         |
//! | `token`                               | persistent | credential snapshot        |
//! | `ecm_kc_login_in_progress`            | session    | `"1"`                      |
//! | `ecm_kc_login_in_progress_started_at` | session    | epoch milliseconds         |
//! | `ecm_auth_redirect_failure_count`     | session    | failed automatic redirects |
//! | `ecm_auth_redirect_last_failure_at`   | session    | epoch milliseconds         |
//!
//! Failed automatic login redirects are counted inside a sliding window.
//! Once the count reaches the policy's cap, automatic redirects pause until
//! the cooldown since the last failure has elapsed. A manual sign-in clears
//! the count.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ecm_domain::constants::{
    AUTH_INIT_STATUS_KEY, AUTH_REDIRECT_FAILURE_COOLDOWN_MS, AUTH_REDIRECT_FAILURE_COUNT_KEY,
    AUTH_REDIRECT_FAILURE_WINDOW_MS, AUTH_REDIRECT_LAST_FAILURE_AT_KEY,
    AUTH_REDIRECT_MAX_AUTO_ATTEMPTS, AUTH_REDIRECT_REASON_KEY, LOGIN_IN_PROGRESS_KEY,
    LOGIN_IN_PROGRESS_STARTED_AT_KEY, LOGIN_IN_PROGRESS_TIMEOUT_MS, TOKEN_KEY,
};
use ecm_domain::{InitStatus, RedirectReason, Result, SessionConfig, StorageScope};
use tracing::debug;

use crate::ports::SessionStore;

/// Back-off limits for automatic login redirects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectFailurePolicy {
    /// Pause after the last failure once the cap is reached
    pub cooldown: Duration,
    /// Failures within the window before automatic redirects pause
    pub max_auto_attempts: u32,
    /// Failures further apart than this restart the count
    pub window: Duration,
}

impl Default for RedirectFailurePolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(AUTH_REDIRECT_FAILURE_COOLDOWN_MS),
            max_auto_attempts: AUTH_REDIRECT_MAX_AUTO_ATTEMPTS,
            window: Duration::from_millis(AUTH_REDIRECT_FAILURE_WINDOW_MS),
        }
    }
}

impl RedirectFailurePolicy {
    /// Policy from the `session` config section
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            cooldown: config.redirect_failure_cooldown(),
            max_auto_attempts: config.redirect_max_auto_attempts,
            window: config.redirect_failure_window(),
        }
    }
}

/// Marker accessor over a [`SessionStore`]
#[derive(Clone)]
pub struct SessionMarkers {
    store: Arc<dyn SessionStore>,
    login_timeout: Duration,
    redirect_policy: RedirectFailurePolicy,
}

impl SessionMarkers {
    /// Markers with the default login timeout and redirect back-off
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            login_timeout: Duration::from_millis(LOGIN_IN_PROGRESS_TIMEOUT_MS),
            redirect_policy: RedirectFailurePolicy::default(),
        }
    }

    /// Override how long a login flow counts as in progress
    #[must_use]
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Override the redirect failure back-off
    #[must_use]
    pub fn with_redirect_policy(mut self, policy: RedirectFailurePolicy) -> Self {
        self.redirect_policy = policy;
        self
    }

    /// Active redirect failure back-off
    pub fn redirect_policy(&self) -> RedirectFailurePolicy {
        self.redirect_policy
    }

    /// Recorded init status; unknown stored values read as `None`
    pub fn init_status(&self) -> Result<Option<InitStatus>> {
        let raw = self.store.get(StorageScope::Session, AUTH_INIT_STATUS_KEY)?;
        Ok(raw.and_then(|value| value.parse().ok()))
    }

    /// Record the init status
    pub fn set_init_status(&self, status: InitStatus) -> Result<()> {
        self.store.set(StorageScope::Session, AUTH_INIT_STATUS_KEY, &status.to_string())
    }

    /// Remove the init status, optionally keeping a `session_expired` marker
    pub fn clear_init_status(&self, preserve_session_expired: bool) -> Result<()> {
        if preserve_session_expired && self.init_status()? == Some(InitStatus::SessionExpired) {
            return Ok(());
        }
        self.store.remove(StorageScope::Session, AUTH_INIT_STATUS_KEY)
    }

    /// Reason for the last login redirect
    pub fn redirect_reason(&self) -> Result<Option<RedirectReason>> {
        let raw = self.store.get(StorageScope::Persistent, AUTH_REDIRECT_REASON_KEY)?;
        Ok(raw.and_then(|value| value.parse().ok()))
    }

    /// Record why the user was sent to login
    pub fn set_redirect_reason(&self, reason: RedirectReason) -> Result<()> {
        self.store.set(StorageScope::Persistent, AUTH_REDIRECT_REASON_KEY, &reason.to_string())
    }

    /// Forget the last redirect reason
    pub fn clear_redirect_reason(&self) -> Result<()> {
        self.store.remove(StorageScope::Persistent, AUTH_REDIRECT_REASON_KEY)
    }

    /// Drop the stored credential snapshot
    pub fn clear_credential(&self) -> Result<()> {
        self.store.remove(StorageScope::Persistent, TOKEN_KEY)
    }

    /// Record that an interactive login flow started at `now`
    pub fn begin_login(&self, now: DateTime<Utc>) -> Result<()> {
        self.store.set(StorageScope::Session, LOGIN_IN_PROGRESS_KEY, "1")?;
        self.store.set(
            StorageScope::Session,
            LOGIN_IN_PROGRESS_STARTED_AT_KEY,
            &now.timestamp_millis().to_string(),
        )
    }

    /// Remove both login progress markers
    pub fn clear_login_progress(&self) -> Result<()> {
        self.store.remove(StorageScope::Session, LOGIN_IN_PROGRESS_KEY)?;
        self.store.remove(StorageScope::Session, LOGIN_IN_PROGRESS_STARTED_AT_KEY)
    }

    /// Whether a login flow started less than the login timeout ago
    ///
    /// Stale or malformed progress markers are cleared.
    pub fn is_login_in_progress(&self, now: DateTime<Utc>) -> Result<bool> {
        if self.store.get(StorageScope::Session, LOGIN_IN_PROGRESS_KEY)?.as_deref() != Some("1") {
            return Ok(false);
        }

        let started_at = self
            .store
            .get(StorageScope::Session, LOGIN_IN_PROGRESS_STARTED_AT_KEY)?
            .and_then(|raw| raw.trim().parse::<i64>().ok());

        let fresh = started_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .is_some_and(|started| elapsed_below(now, started, self.login_timeout));

        if !fresh {
            debug!(started_at = ?started_at, "clearing stale login progress markers");
            self.clear_login_progress()?;
        }
        Ok(fresh)
    }

    /// Failed automatic redirects in the current window; `0` when unset
    pub fn redirect_failure_count(&self) -> Result<u32> {
        let raw = self.store.get(StorageScope::Session, AUTH_REDIRECT_FAILURE_COUNT_KEY)?;
        Ok(raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0))
    }

    /// Time of the last failed automatic redirect
    pub fn last_redirect_failure_at(&self) -> Result<Option<DateTime<Utc>>> {
        let raw = self.store.get(StorageScope::Session, AUTH_REDIRECT_LAST_FAILURE_AT_KEY)?;
        Ok(raw
            .and_then(|value| value.trim().parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis))
    }

    /// Count a failed automatic redirect at `now` and return the new count
    ///
    /// A failure outside the window of the previous one restarts at `1`.
    pub fn record_redirect_failure(&self, now: DateTime<Utc>) -> Result<u32> {
        let within_window = self
            .last_redirect_failure_at()?
            .is_some_and(|last| elapsed_below(now, last, self.redirect_policy.window));
        let count = if within_window {
            self.redirect_failure_count()?.saturating_add(1)
        } else {
            1
        };

        self.store.set(StorageScope::Session, AUTH_REDIRECT_FAILURE_COUNT_KEY, &count.to_string())?;
        self.store.set(
            StorageScope::Session,
            AUTH_REDIRECT_LAST_FAILURE_AT_KEY,
            &now.timestamp_millis().to_string(),
        )?;
        Ok(count)
    }

    /// Time until automatic redirects resume, `None` when they are not paused
    pub fn auto_redirect_resumes_in(&self, now: DateTime<Utc>) -> Result<Option<Duration>> {
        if self.redirect_failure_count()? < self.redirect_policy.max_auto_attempts {
            return Ok(None);
        }
        let Some(last) = self.last_redirect_failure_at()? else {
            return Ok(None);
        };

        let cooldown = self.redirect_policy.cooldown;
        Ok(elapsed_since(now, last)
            .filter(|elapsed| *elapsed < cooldown)
            .map(|elapsed| cooldown.saturating_sub(elapsed)))
    }

    /// Whether the failure cap is reached and the cooldown is still running
    pub fn is_auto_redirect_paused(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.auto_redirect_resumes_in(now)?.is_some())
    }

    /// Reset the redirect back-off
    pub fn clear_redirect_failures(&self) -> Result<()> {
        self.store.remove(StorageScope::Session, AUTH_REDIRECT_FAILURE_COUNT_KEY)?;
        self.store.remove(StorageScope::Session, AUTH_REDIRECT_LAST_FAILURE_AT_KEY)
    }
}

/// Whole milliseconds from `since` to `now`; `None` when `now` is earlier
fn elapsed_since(now: DateTime<Utc>, since: DateTime<Utc>) -> Option<Duration> {
    let elapsed = now.timestamp_millis().checked_sub(since.timestamp_millis())?;
    u64::try_from(elapsed).ok().map(Duration::from_millis)
}

fn elapsed_below(now: DateTime<Utc>, since: DateTime<Utc>, limit: Duration) -> bool {
    elapsed_since(now, since).is_some_and(|elapsed| elapsed < limit)
}
