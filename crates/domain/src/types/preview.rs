//! Preview (derived-artifact job) failure types

use serde::{Deserialize, Serialize};

/// Backend classification of a failed preview job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreviewFailureCategory {
    Unsupported,
    Temporary,
    Permanent,
    Unspecified,
}

impl PreviewFailureCategory {
    /// Map a raw backend category onto a known variant
    ///
    /// Case-insensitive. Any value mentioning `UNSUPPORTED`
    /// (`UNSUPPORTED_MEDIA_TYPE`, ...) is unsupported; missing or unknown
    /// values are unspecified.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Unspecified;
        };
        let normalized = raw.trim().to_uppercase();
        if normalized.contains("UNSUPPORTED") {
            Self::Unsupported
        } else if normalized == "TEMPORARY" {
            Self::Temporary
        } else if normalized == "PERMANENT" {
            Self::Permanent
        } else {
            Self::Unspecified
        }
    }
}

/// Preview state of one listed document, as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewItem {
    pub preview_status: Option<String>,
    pub preview_failure_category: Option<String>,
    pub preview_failure_reason: Option<String>,
    pub mime_type: Option<String>,
}

/// Retry decision for one failed preview job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PreviewFailureVerdict {
    pub label: &'static str,
    pub retryable: bool,
    pub unsupported: bool,
}

/// Retryable failures sharing one normalized reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Aggregate over the failed items of one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewFailureSummary {
    pub total_failed: usize,
    pub retryable_failed: usize,
    pub unsupported_failed: usize,
    pub permanent_failed: usize,
    pub retryable_reasons: Vec<ReasonCount>,
}

/// Progress counters of a batch preview operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub queued: usize,
    pub skipped: usize,
    pub failed: usize,
}
