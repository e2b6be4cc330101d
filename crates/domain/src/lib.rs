//! # ECM Domain
//!
//! Data model for the ECM client resilience layer.
//!
//! This crate contains:
//! - Request descriptors, retry markers and transport error envelopes
//! - Session marker keys and statuses
//! - Token claims decoding
//! - Preview (derived-artifact job) failure types
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - Depends only on `ecm-common` (foundation tier) for classification
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
