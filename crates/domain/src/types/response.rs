//! Transport responses and failure envelopes

use std::collections::BTreeMap;
use std::fmt;

use ecm_common::error::{ErrorCategory, ErrorClassification, ErrorSubject};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::constants::{CODE_CANCELED, CODE_CONNECTION_ABORTED, CODE_NETWORK, CODE_TIMED_OUT};
use crate::types::request::RequestDescriptor;

/// Successful (2xx) transport response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    /// Final URL after redirects
    pub url: Option<String>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into(), ..Self::default() }
    }

    /// JSON response with the given body
    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Whether the response carries no content (204/205 or empty body)
    pub fn is_empty(&self) -> bool {
        matches!(self.status, 204 | 205) || self.body.is_empty()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failed request as observed by the recovery layer
///
/// Carries whichever of status, transport code and body were available,
/// plus the descriptor that produced it. The descriptor may be missing when
/// the transport lost it; `response_url` is then the only identity hint.
#[derive(Debug, Clone, Default)]
pub struct ErrorEnvelope {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub body: Option<Value>,
    pub message: String,
    pub request: Option<RequestDescriptor>,
    pub response_url: Option<String>,
}

impl ErrorEnvelope {
    /// Non-2xx response
    pub fn from_status(status: u16, body: Option<Value>) -> Self {
        Self {
            status: Some(status),
            body,
            message: format!("Request failed with status code {status}"),
            ..Self::default()
        }
    }

    /// Transport-level timeout
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            code: Some(CODE_CONNECTION_ABORTED.to_string()),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Connection failure with no response
    pub fn network(message: impl Into<String>) -> Self {
        Self { code: Some(CODE_NETWORK.to_string()), message: message.into(), ..Self::default() }
    }

    /// Caller-initiated cancellation
    pub fn cancelled() -> Self {
        Self {
            code: Some(CODE_CANCELED.to_string()),
            message: "canceled".to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_request(mut self, request: RequestDescriptor) -> Self {
        self.request = Some(request);
        self
    }

    #[must_use]
    pub fn with_response_url(mut self, url: impl Into<String>) -> Self {
        self.response_url = Some(url.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.code.as_deref() == Some(CODE_CANCELED)
    }

    /// Transport abort or timeout code
    pub fn is_timeout(&self) -> bool {
        matches!(self.code.as_deref(), Some(CODE_CONNECTION_ABORTED | CODE_TIMED_OUT))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    /// Server-supplied `message` field from a JSON body
    pub fn server_message(&self) -> Option<&str> {
        self.body_field("message")
    }

    /// Server-supplied `error` field from a JSON body
    pub fn response_error(&self) -> Option<&str> {
        self.body_field("error")
    }

    fn body_field(&self, field: &str) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| body.get(field))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, self.status) {
            (Some(code), _) => write!(f, "{} ({code})", self.message),
            (None, Some(status)) => write!(f, "{} [{status}]", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ErrorEnvelope {}

impl From<&ErrorEnvelope> for ErrorSubject {
    fn from(envelope: &ErrorEnvelope) -> Self {
        let mut subject = ErrorSubject::new().with_message(envelope.message.clone());
        if let Some(status) = envelope.status {
            subject = subject.with_status(status);
        }
        if let Some(message) = envelope.server_message() {
            subject = subject.with_response_message(message);
        }
        if let Some(error) = envelope.response_error() {
            subject = subject.with_response_error(error);
        }
        subject
    }
}

impl ErrorClassification for ErrorEnvelope {
    fn category(&self) -> ErrorCategory {
        ecm_common::error::classify(self)
    }
}
