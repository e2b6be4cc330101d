//! Preview job failure classification
//!
//! Decides, for a failed derived-artifact job, whether the failure is
//! unsupported input, retryable, or permanent. Precedence:
//!
//! 1. Unsupported if the category says so, the reason matches an
//!    unsupported phrase, or the mime type is a generic binary placeholder
//! 2. Otherwise retryable unless the category is `PERMANENT`
//!
//! The signals can disagree (a `TEMPORARY` category with an "unsupported"
//! reason). The order above decides; it is a heuristic over backend text.

use std::collections::HashMap;

use ecm_domain::{
    BatchProgress, PreviewFailureCategory, PreviewFailureSummary, PreviewFailureVerdict,
    PreviewItem, ReasonCount,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Reason bucket for failures without a reason
pub const UNSPECIFIED_REASON: &str = "UNSPECIFIED";

const UNSUPPORTED_MIME_TYPES: &[&str] =
    &["application/octet-stream", "binary/octet-stream", "application/x-empty"];

const UNSUPPORTED_REASON_PHRASES: &[&str] = &[
    "preview not supported",
    "not supported for mime type",
    "unsupported media type",
    "unsupported",
    "not available for empty pdf content",
];

const TEMPORARY_REASON_PHRASES: &[&str] = &[
    "error generating preview",
    "cad preview failed",
    "timeout",
    "timed out",
    "temporar",
    "connection reset",
    "connection refused",
    "service unavailable",
    "502",
    "503",
    "504",
];

const FAILED_STATUS: &str = "FAILED";
const UNSUPPORTED_STATUS: &str = "UNSUPPORTED";

const NON_RETRYABLE_SUMMARY: &str =
    "All preview issues on this page are permanent or unsupported; retry actions are hidden.";

static SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\s\-_]+").expect("SEPARATORS should compile - this is a bug")
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("WHITESPACE should compile - this is a bug"));

/// Classifier for failed preview jobs
pub struct AsyncJobFailureClassifier;

impl AsyncJobFailureClassifier {
    /// Classify one failure from its raw category, mime type and reason
    ///
    /// Total over all inputs, including all-`None`.
    pub fn classify(
        category: Option<&str>,
        mime_type: Option<&str>,
        reason: Option<&str>,
    ) -> PreviewFailureVerdict {
        let category = PreviewFailureCategory::from_raw(category);

        if category == PreviewFailureCategory::Unsupported
            || is_unsupported_reason(reason)
            || is_unsupported_mime_type(mime_type)
        {
            return PreviewFailureVerdict { label: "unsupported", retryable: false, unsupported: true };
        }

        match category {
            PreviewFailureCategory::Permanent => {
                PreviewFailureVerdict { label: "failed (permanent)", retryable: false, unsupported: false }
            }
            PreviewFailureCategory::Temporary => {
                PreviewFailureVerdict { label: "failed (temporary)", retryable: true, unsupported: false }
            }
            _ => PreviewFailureVerdict { label: "failed", retryable: true, unsupported: false },
        }
    }

    /// Summarize the failed items of one page
    ///
    /// Items whose status is not `FAILED` are ignored. Retryable failures are
    /// bucketed by normalized reason, largest bucket first, ties by reason.
    pub fn summarize(items: &[PreviewItem]) -> PreviewFailureSummary {
        let mut summary = PreviewFailureSummary::default();
        let mut buckets: HashMap<String, usize> = HashMap::new();

        for item in items.iter().filter(|item| is_failed(item.preview_status.as_deref())) {
            summary.total_failed += 1;
            let verdict = Self::classify(
                item.preview_failure_category.as_deref(),
                item.mime_type.as_deref(),
                item.preview_failure_reason.as_deref(),
            );

            if verdict.unsupported {
                summary.unsupported_failed += 1;
            } else if verdict.retryable {
                summary.retryable_failed += 1;
                let reason = reason_bucket(item.preview_failure_reason.as_deref());
                *buckets.entry(reason).or_default() += 1;
            } else {
                summary.permanent_failed += 1;
            }
        }

        let mut reasons: Vec<ReasonCount> =
            buckets.into_iter().map(|(reason, count)| ReasonCount { reason, count }).collect();
        reasons.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
        summary.retryable_reasons = reasons;
        summary
    }
}

/// Strip parameters and lowercase; `None` for blank input
pub fn normalize_mime_type(mime_type: Option<&str>) -> Option<String> {
    let essence = mime_type?.split(';').next()?.trim().to_lowercase();
    (!essence.is_empty()).then_some(essence)
}

/// Whether previews can never be generated for `mime_type`
pub fn is_unsupported_mime_type(mime_type: Option<&str>) -> bool {
    normalize_mime_type(mime_type).is_some_and(|mime| UNSUPPORTED_MIME_TYPES.contains(&mime.as_str()))
}

/// Whether the reason text says the input cannot be previewed
///
/// Whitespace, `-` and `_` runs are treated as one space, so
/// `not-supported` and `unsupported_media_type` match.
pub fn is_unsupported_reason(reason: Option<&str>) -> bool {
    let normalized = collapse_separators(reason);
    !normalized.is_empty()
        && UNSUPPORTED_REASON_PHRASES.iter().any(|phrase| normalized.contains(phrase))
}

/// Whether the reason text hints at a transient backend condition
pub fn is_temporary_reason(reason: Option<&str>) -> bool {
    let normalized = collapse_separators(reason);
    !normalized.is_empty()
        && TEMPORARY_REASON_PHRASES.iter().any(|phrase| normalized.contains(phrase))
}

/// Collapse whitespace; blank reasons become [`UNSPECIFIED_REASON`]
pub fn normalize_failure_reason(reason: Option<&str>) -> String {
    let collapsed = WHITESPACE.replace_all(reason.unwrap_or_default().trim(), " ");
    if collapsed.is_empty() {
        UNSPECIFIED_REASON.to_string()
    } else {
        collapsed.into_owned()
    }
}

/// Display label for a failure reason
pub fn format_failure_reason_label(reason: Option<&str>) -> String {
    let normalized = normalize_failure_reason(reason);
    if normalized == UNSPECIFIED_REASON {
        "Unspecified reason".to_string()
    } else {
        normalized
    }
}

/// Status to display: a failed job with unsupported input shows as
/// `UNSUPPORTED`
pub fn effective_status(
    status: Option<&str>,
    category: Option<&str>,
    mime_type: Option<&str>,
    reason: Option<&str>,
) -> Option<String> {
    let status = status.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty())?;
    if status == FAILED_STATUS
        && AsyncJobFailureClassifier::classify(category, mime_type, reason).unsupported
    {
        return Some(UNSUPPORTED_STATUS.to_string());
    }
    Some(status)
}

/// Message shown when no failure on the page can be retried
pub fn non_retryable_summary_message(summary: &PreviewFailureSummary) -> Option<&'static str> {
    (summary.total_failed > 0 && summary.retryable_failed == 0).then_some(NON_RETRYABLE_SUMMARY)
}

/// One-line batch progress summary for status displays
pub fn format_batch_progress(progress: &BatchProgress) -> String {
    format!(
        "{}/{} processed • queued {} • skipped {} • failed {}",
        progress.processed, progress.total, progress.queued, progress.skipped, progress.failed
    )
}

fn is_failed(status: Option<&str>) -> bool {
    status.is_some_and(|s| s.trim().eq_ignore_ascii_case(FAILED_STATUS))
}

/// Bucket key for a retryable reason: lowercased with separator runs
/// collapsed, [`UNSPECIFIED_REASON`] when blank
fn reason_bucket(reason: Option<&str>) -> String {
    let collapsed = collapse_separators(reason);
    if collapsed.is_empty() {
        UNSPECIFIED_REASON.to_string()
    } else {
        collapsed
    }
}

fn collapse_separators(reason: Option<&str>) -> String {
    let lowered = reason.unwrap_or_default().trim().to_lowercase();
    SEPARATORS.replace_all(&lowered, " ").into_owned()
}
