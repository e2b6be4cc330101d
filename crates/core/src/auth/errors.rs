//! Token refresh errors

use ecm_common::error::{classify, ErrorCategory, ErrorClassification, ErrorSubject};
use ecm_domain::constants::{CODE_CONNECTION_ABORTED, CODE_NETWORK};
use thiserror::Error;

/// Terminal error code returned by identity providers for revoked sessions
pub const INVALID_GRANT: &str = "invalid_grant";

/// Failure of a token refresh
///
/// Cloneable so one refresh outcome can be handed to every caller that
/// joined the same in-flight refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token refresh failed: {message}")]
pub struct RefreshError {
    /// HTTP status of the refresh response, absent for network failures
    pub status: Option<u16>,
    /// Provider or transport error code (`invalid_grant`, `ECONNABORTED`, ...)
    pub code: Option<String>,
    pub message: String,
}

impl RefreshError {
    /// Error with a message and no status or code
    pub fn new(message: impl Into<String>) -> Self {
        Self { status: None, code: None, message: message.into() }
    }

    /// Attach the HTTP status of the refresh response
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the transport error code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Provider rejected the session
    pub fn invalid_grant(status: u16) -> Self {
        Self::new("refresh token rejected").with_status(status).with_code(INVALID_GRANT)
    }

    /// No response from the provider
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message).with_code(CODE_NETWORK)
    }

    /// Refresh that ran out of time
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(message).with_code(CODE_CONNECTION_ABORTED)
    }

    /// Whether this failure must end the session
    pub fn should_logout(&self) -> bool {
        super::refresh_failure::should_logout(self)
    }
}

impl From<&RefreshError> for ErrorSubject {
    fn from(error: &RefreshError) -> Self {
        let mut subject = ErrorSubject::new().with_message(error.message.clone());
        if let Some(status) = error.status {
            subject = subject.with_status(status);
        }
        if let Some(code) = &error.code {
            subject = subject.with_response_error(code.clone());
        }
        subject
    }
}

impl ErrorClassification for RefreshError {
    fn category(&self) -> ErrorCategory {
        classify(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_grant_carries_status_and_code() {
        let err = RefreshError::invalid_grant(401);
        assert_eq!(err.status, Some(401));
        assert_eq!(err.code.as_deref(), Some(INVALID_GRANT));
        assert_eq!(err.category(), ErrorCategory::Authorization);
    }

    #[test]
    fn network_failures_classify_as_transient() {
        let err = RefreshError::network("Network Error");
        assert_eq!(err.category(), ErrorCategory::Transient);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "token refresh failed: Network Error");
    }
}
