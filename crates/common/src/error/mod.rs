//! Generic error classification for user-facing recovery
//!
//! Any failure that reaches the user, whether it came from the HTTP layer, a
//! backend message or a plain string, can be mapped onto a small, fixed set
//! of [`ErrorCategory`] values. Each category carries a retry decision and a
//! recovery hint, so screens never need to inspect raw status codes.
//!
//! # Classification Precedence
//!
//! | Order | Condition | Category |
//! |-------|-----------|----------|
//! | 1 | status 401/403, or auth wording | `Authorization` |
//! | 2 | status 400/422, or validation/parse wording | `Query` |
//! | 3 | status 408/429, or network/timeout wording | `Transient` |
//! | 4 | status >= 500 | `Server` |
//! | 5 | anything else | `Unknown` |
//!
//! Classification is total: an empty [`ErrorSubject`] maps to `Unknown`.
//!
//! # Examples
//!
//! ```
//! use ecm_common::error::{build_recovery, classify, ErrorCategory};
//!
//! assert_eq!(classify("Network Error"), ErrorCategory::Transient);
//! assert!(build_recovery("Network Error", "Request failed").can_retry);
//! ```

mod classifier;

pub use classifier::{
    build_recovery, classify, resolve_message, ErrorCategory, ErrorRecovery, ErrorSubject,
    DEFAULT_FAILURE_MESSAGE,
};

/// Standard interface for errors that can describe their own category
///
/// Implemented by transport envelopes and facade errors so that retry
/// decisions and user messaging share one taxonomy.
pub trait ErrorClassification {
    /// The generic category for this error
    fn category(&self) -> ErrorCategory;

    /// Check if the caller may offer a retry
    ///
    /// `Authorization` and `Query` errors need user action first.
    fn is_retryable(&self) -> bool {
        self.category().can_retry()
    }
}
