//! API facade error types
//!
//! Errors surfaced to callers after the recovery pipeline gave up. Each
//! variant maps onto the generic [`ErrorCategory`] taxonomy so screens can
//! decide on retry affordances without looking at status codes.

use ecm_common::error::{
    classify, resolve_message, ErrorCategory, ErrorClassification, ErrorSubject,
    DEFAULT_FAILURE_MESSAGE,
};
use ecm_domain::{EcmError, ErrorEnvelope};
use thiserror::Error;

/// API operation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// 401/403 that survived recovery
    #[error("Authentication failed: {message}")]
    Auth { status: u16, message: String },

    /// Any other 4xx
    #[error("Client error ({status}): {message}")]
    Client { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Check if the caller may retry the operation as-is
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Cancelled | Self::Decode(_) | Self::Config(_) | Self::Internal(_) => false,
            _ => self.is_retryable(),
        }
    }

    /// HTTP status behind the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Client { status, .. } | Self::Server { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<ErrorEnvelope> for ApiError {
    fn from(envelope: ErrorEnvelope) -> Self {
        if envelope.is_cancelled() {
            return Self::Cancelled;
        }
        if envelope.is_timeout() {
            return Self::Timeout(envelope.message);
        }

        let message = resolve_message(&envelope, DEFAULT_FAILURE_MESSAGE);
        match envelope.status {
            Some(status @ (401 | 403)) => Self::Auth { status, message },
            Some(status) if status >= 500 => Self::Server { status, message },
            Some(status) => Self::Client { status, message },
            None => Self::Network(message),
        }
    }
}

impl From<EcmError> for ApiError {
    fn from(err: EcmError) -> Self {
        match err {
            EcmError::Config(message) => Self::Config(message),
            EcmError::Serialization(message) => Self::Decode(message),
            EcmError::Network(message) => Self::Network(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<&ApiError> for ErrorSubject {
    fn from(err: &ApiError) -> Self {
        let subject = ErrorSubject::new();
        match err {
            ApiError::Auth { status, message }
            | ApiError::Client { status, message }
            | ApiError::Server { status, message } => {
                subject.with_status(*status).with_message(message.clone())
            }
            other => subject.with_message(other.to_string()),
        }
    }
}

impl ErrorClassification for ApiError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) | Self::Timeout(_) => ErrorCategory::Transient,
            Self::Cancelled | Self::Decode(_) | Self::Config(_) | Self::Internal(_) => {
                ErrorCategory::Unknown
            }
            _ => classify(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_status_selects_variant() {
        assert!(matches!(
            ApiError::from(ErrorEnvelope::from_status(401, None)),
            ApiError::Auth { status: 401, .. }
        ));
        assert!(matches!(
            ApiError::from(ErrorEnvelope::from_status(503, None)),
            ApiError::Server { status: 503, .. }
        ));
        assert!(matches!(
            ApiError::from(ErrorEnvelope::from_status(404, None)),
            ApiError::Client { status: 404, .. }
        ));
        assert!(matches!(
            ApiError::from(ErrorEnvelope::network("Network Error")),
            ApiError::Network(_)
        ));
        assert_eq!(ApiError::from(ErrorEnvelope::cancelled()), ApiError::Cancelled);
        assert_eq!(
            ApiError::from(ErrorEnvelope::timeout("timeout of 10ms exceeded")),
            ApiError::Timeout("timeout of 10ms exceeded".into())
        );
    }

    #[test]
    fn message_includes_server_text() {
        let envelope =
            ErrorEnvelope::from_status(409, Some(json!({ "message": "Folder already exists" })));
        let ApiError::Client { message, .. } = ApiError::from(envelope) else {
            panic!("expected client error");
        };
        assert!(message.starts_with("Folder already exists"));
    }

    #[test]
    fn categories_follow_generic_taxonomy() {
        let auth = ApiError::Auth { status: 401, message: "Unauthorized".into() };
        let query = ApiError::Client { status: 422, message: "Invalid filter".into() };
        let throttled = ApiError::Client { status: 429, message: "Too Many Requests".into() };
        let server = ApiError::Server { status: 500, message: "boom".into() };

        assert_eq!(auth.category(), ErrorCategory::Authorization);
        assert_eq!(query.category(), ErrorCategory::Query);
        assert_eq!(throttled.category(), ErrorCategory::Transient);
        assert_eq!(server.category(), ErrorCategory::Server);
        assert_eq!(ApiError::Timeout("t".into()).category(), ErrorCategory::Transient);
    }

    #[test]
    fn retry_decisions() {
        assert!(ApiError::Network("offline".into()).should_retry());
        assert!(ApiError::Server { status: 502, message: "bad gateway".into() }.should_retry());
        assert!(!ApiError::Auth { status: 403, message: "Forbidden".into() }.should_retry());
        assert!(!ApiError::Client { status: 400, message: "Bad Request".into() }.should_retry());
        assert!(!ApiError::Cancelled.should_retry());
        assert!(!ApiError::Decode("eof".into()).should_retry());
    }
}
