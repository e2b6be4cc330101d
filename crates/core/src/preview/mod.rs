//! Preview job failure classification

pub mod classifier;

pub use classifier::{
    effective_status, format_batch_progress, format_failure_reason_label, is_temporary_reason,
    is_unsupported_mime_type, is_unsupported_reason, non_retryable_summary_message,
    normalize_failure_reason, normalize_mime_type, AsyncJobFailureClassifier, UNSPECIFIED_REASON,
};
