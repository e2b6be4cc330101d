//! Modular common utilities shared across ECM crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification and recovery hints
//! - `observability`: recovery event logging through `tracing`
//! - `runtime`: async coordination primitives (single-flight)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Observability tier
// --------------------------------------------------------------
#[cfg(feature = "observability")]
pub mod observability;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{
    build_recovery, classify, resolve_message, ErrorCategory, ErrorClassification, ErrorRecovery,
    ErrorSubject,
};
#[cfg(feature = "observability")]
pub use observability::{is_recovery_debug_enabled, log_recovery_event, set_recovery_debug};
#[cfg(feature = "runtime")]
pub use resilience::{Flight, SingleFlight};
