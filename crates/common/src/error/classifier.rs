use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fallback message used when an error carries no text at all
pub const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";

static TRANSIENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)network error|failed to fetch|timeout|timed out|temporar(?:y|ily)|connection reset|econnreset|econnrefused|econnaborted|etimedout",
    )
    .expect("TRANSIENT_PATTERN should compile - this is a bug")
});

static AUTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)unauthorized|forbidden|session expired|not authenticated")
        .expect("AUTH_PATTERN should compile - this is a bug")
});

static QUERY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)invalid query|invalid request|bad request|malformed|parse exception|parse error|query syntax|too many clauses|validation failed",
    )
    .expect("QUERY_PATTERN should compile - this is a bug")
});

/// Generic error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Network, timeout or throttling issue; safe to retry
    Transient,
    /// Expired or insufficient credentials; user must sign in again
    Authorization,
    /// Malformed input or failed validation; user must change the input
    Query,
    /// Backend failure; retry may succeed later
    Server,
    /// Nothing matched; retry is allowed so the user is never blocked
    Unknown,
}

impl ErrorCategory {
    /// Stable lowercase label for logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Authorization => "authorization",
            Self::Query => "query",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a retry may be offered without user action
    #[must_use]
    pub const fn can_retry(self) -> bool {
        !matches!(self, Self::Authorization | Self::Query)
    }

    /// Fixed recovery hint for this category
    #[must_use]
    pub const fn hint(self) -> &'static str {
        match self {
            Self::Authorization => {
                "Session or permission issue detected. Sign in again or check your access."
            }
            Self::Query => "Update the request input or filters, then try again.",
            Self::Transient => "Temporary issue detected. Retry now.",
            Self::Server => "Server processing failed. Retry now or try again later.",
            Self::Unknown => "Retry now, or contact support if the issue persists.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of an arbitrary error that classification looks at
///
/// Build one from a message (`"Network Error".into()`), from a status code
/// (`401u16.into()`), or field by field for backend responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSubject {
    status: Option<u16>,
    message: Option<String>,
    response_message: Option<String>,
    response_error: Option<String>,
}

impl ErrorSubject {
    /// Empty subject; classifies as [`ErrorCategory::Unknown`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subject built from any `std::error::Error` display text
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + '_)) -> Self {
        Self::new().with_message(error.to_string())
    }

    /// Attach an HTTP status
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a human-readable message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = non_empty(message.into());
        self
    }

    /// `message` field of a backend error body
    #[must_use]
    pub fn with_response_message(mut self, message: impl Into<String>) -> Self {
        self.response_message = non_empty(message.into());
        self
    }

    /// `error` field of a backend error body
    #[must_use]
    pub fn with_response_error(mut self, error: impl Into<String>) -> Self {
        self.response_error = non_empty(error.into());
        self
    }

    /// HTTP status, when the failure carried one
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Combined text blob: response message, response error, then message
    #[must_use]
    pub fn text(&self) -> String {
        [&self.response_message, &self.response_error, &self.message]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<&str> for ErrorSubject {
    fn from(message: &str) -> Self {
        Self::new().with_message(message)
    }
}

impl From<String> for ErrorSubject {
    fn from(message: String) -> Self {
        Self::new().with_message(message)
    }
}

impl From<u16> for ErrorSubject {
    fn from(status: u16) -> Self {
        Self::new().with_status(status)
    }
}

/// Recovery guidance for a classified error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecovery {
    pub category: ErrorCategory,
    pub message: String,
    pub can_retry: bool,
    pub hint: String,
}

/// Map an error onto its [`ErrorCategory`]
///
/// Total and deterministic over every input.
pub fn classify(error: impl Into<ErrorSubject>) -> ErrorCategory {
    classify_subject(&error.into())
}

/// User-displayable message for an error, or `fallback` when it has no text
pub fn resolve_message(error: impl Into<ErrorSubject>, fallback: &str) -> String {
    message_for(&error.into(), fallback)
}

/// Classify an error and attach the category's retry decision and hint
pub fn build_recovery(error: impl Into<ErrorSubject>, fallback: &str) -> ErrorRecovery {
    let subject = error.into();
    let category = classify_subject(&subject);

    ErrorRecovery {
        category,
        message: message_for(&subject, fallback),
        can_retry: category.can_retry(),
        hint: category.hint().to_string(),
    }
}

fn classify_subject(subject: &ErrorSubject) -> ErrorCategory {
    let status = subject.status();
    let text = subject.text();

    if matches!(status, Some(401 | 403)) || AUTH_PATTERN.is_match(&text) {
        return ErrorCategory::Authorization;
    }
    if matches!(status, Some(400 | 422)) || QUERY_PATTERN.is_match(&text) {
        return ErrorCategory::Query;
    }
    if matches!(status, Some(408 | 429)) || TRANSIENT_PATTERN.is_match(&text) {
        return ErrorCategory::Transient;
    }
    if status.is_some_and(|code| code >= 500) {
        return ErrorCategory::Server;
    }
    ErrorCategory::Unknown
}

fn message_for(subject: &ErrorSubject, fallback: &str) -> String {
    let text = subject.text();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
