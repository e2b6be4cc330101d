//! # ECM Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - The reqwest HTTP transport
//! - The `ApiClient` facade over the resilient pipeline
//! - The backend identity client
//! - File-backed session storage
//! - Notifier and navigator adapters for hosts without a UI router
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `ecm-core`
//! - Depends on `ecm-common`, `ecm-domain` and `ecm-core`
//! - Contains all "impure" code (network, filesystem, process-wide logging)

pub mod api;
pub mod config;
pub mod http;
pub mod identity;
pub mod logging;
pub mod navigation;
pub mod notify;
pub mod session;

// Re-export commonly used items
pub use api::{ApiClient, ApiClientBuilder, ApiError};
pub use http::HttpTransport;
pub use identity::BackendIdentityClient;
pub use navigation::{RecordingNavigator, Redirect};
pub use notify::TracingNotifier;
pub use session::{open_store, FileSessionStore};
