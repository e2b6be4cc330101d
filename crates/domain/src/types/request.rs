//! Outgoing request model
//!
//! A [`RequestDescriptor`] describes one attempt of a logical request. Retry
//! attempts are derived with [`RequestDescriptor::derive_retry`], which copies
//! the descriptor, assigns a new attempt id and sets the marker for the
//! failure class that triggered the retry. Markers are never set in place.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::constants::AUTHORIZATION_HEADER;
use crate::impl_domain_status_conversions;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl_domain_status_conversions!(HttpMethod {
    Get => "get",
    Post => "post",
    Put => "put",
    Patch => "patch",
    Delete => "delete",
});

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Kind of work a request performs, selecting its timeout budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    Read,
    Write,
    Upload,
    Download,
}

impl_domain_status_conversions!(OperationClass {
    Read => "read",
    Write => "write",
    Upload => "upload",
    Download => "download",
});

impl OperationClass {
    /// Default class for a JSON request with the given method
    pub fn for_method(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::Read,
            _ => Self::Write,
        }
    }
}

/// Failure classes that carry a retry-once budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    Auth,
    Timeout,
}

/// Retry markers threaded alongside a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryContext {
    pub retried_for_auth: bool,
    pub retried_for_timeout: bool,
}

impl RetryContext {
    pub fn has_retried(&self, class: FailureClass) -> bool {
        match class {
            FailureClass::Auth => self.retried_for_auth,
            FailureClass::Timeout => self.retried_for_timeout,
        }
    }

    /// Copy of this context with the marker for `class` set
    #[must_use]
    pub fn marked(self, class: FailureClass) -> Self {
        match class {
            FailureClass::Auth => Self { retried_for_auth: true, ..self },
            FailureClass::Timeout => Self { retried_for_timeout: true, ..self },
        }
    }
}

/// Multipart file part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Request payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(FilePart),
}

/// One attempt of an outgoing request
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub id: Uuid,
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: RequestBody,
    pub operation: OperationClass,
    pub timeout: Option<Duration>,
    pub retry: RetryContext,
    pub cancellation: Option<CancellationToken>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: RequestBody::Empty,
            operation: OperationClass::for_method(method),
            timeout: None,
            retry: RetryContext::default(),
            cancellation: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn with_file(mut self, part: FilePart) -> Self {
        self.body = RequestBody::Multipart(part);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: OperationClass) -> Self {
        self.operation = operation;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set the bearer `Authorization` header
    pub fn set_bearer(&mut self, token: &str) {
        self.headers.insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {token}"));
    }

    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION_HEADER).map(String::as_str)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// New attempt for a retry after a failure of `class`
    ///
    /// The cancellation token is shared with the original so a caller that
    /// cancels the logical request also cancels its retries.
    #[must_use]
    pub fn derive_retry(&self, class: FailureClass) -> Self {
        Self { id: Uuid::now_v7(), retry: self.retry.marked(class), ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_selects_default_operation_class() {
        assert_eq!(RequestDescriptor::get("/documents").operation, OperationClass::Read);
        assert_eq!(RequestDescriptor::post("/documents").operation, OperationClass::Write);
        assert_eq!(
            RequestDescriptor::new(HttpMethod::Delete, "/documents/1").operation,
            OperationClass::Write
        );
    }

    #[test]
    fn derive_retry_sets_marker_without_touching_original() {
        let original = RequestDescriptor::get("/documents");
        let retry = original.derive_retry(FailureClass::Auth);

        assert!(!original.retry.has_retried(FailureClass::Auth));
        assert!(retry.retry.has_retried(FailureClass::Auth));
        assert!(!retry.retry.has_retried(FailureClass::Timeout));
        assert_ne!(original.id, retry.id);
        assert_eq!(original.url, retry.url);
    }

    #[test]
    fn markers_accumulate_across_classes() {
        let descriptor = RequestDescriptor::get("/documents")
            .derive_retry(FailureClass::Timeout)
            .derive_retry(FailureClass::Auth);

        assert_eq!(
            descriptor.retry,
            RetryContext { retried_for_auth: true, retried_for_timeout: true }
        );
    }

    #[test]
    fn bearer_header_is_replaced() {
        let mut descriptor = RequestDescriptor::get("/documents");
        descriptor.set_bearer("stale");
        descriptor.set_bearer("fresh-token");
        assert_eq!(descriptor.authorization(), Some("Bearer fresh-token"));
    }

    #[test]
    fn cancellation_is_shared_with_retries() {
        let token = CancellationToken::new();
        let original = RequestDescriptor::get("/documents").with_cancellation(token.clone());
        let retry = original.derive_retry(FailureClass::Timeout);

        token.cancel();
        assert!(original.is_cancelled());
        assert!(retry.is_cancelled());
    }

    #[test]
    fn method_round_trips_through_strings() {
        assert_eq!("PATCH".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!(HttpMethod::Patch.as_str(), "PATCH");
        assert_eq!(OperationClass::Upload.to_string(), "upload");
    }
}
