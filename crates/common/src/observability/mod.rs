//! Observability primitives for the recovery layer
//!
//! Recovery events are structured `tracing` records emitted at the points
//! where the HTTP layer refreshes, retries or gives up on a session. They are
//! silent by default and switched on for debugging sessions, with credential
//! fields redacted before anything is logged.

pub mod recovery;

// Re-export commonly used items for convenience
pub use recovery::{
    is_recovery_debug_enabled, log_recovery_event, sanitize_payload, set_recovery_debug,
    RECOVERY_DEBUG_ENV, REDACTED,
};
