//! Refresh failure classification
//!
//! Decides whether a failed refresh ends the session. Only an explicit
//! rejection from the identity provider is terminal: HTTP 401/403 or the
//! `invalid_grant` code. Network failures, timeouts and 5xx responses keep
//! the session and the last known-good token.

use super::errors::{RefreshError, INVALID_GRANT};

/// Whether `error` is terminal and the user must sign in again
pub fn should_logout(error: &RefreshError) -> bool {
    if matches!(error.status, Some(401 | 403)) {
        return true;
    }

    error.code.as_deref().is_some_and(|code| code.eq_ignore_ascii_case(INVALID_GRANT))
}
