//! # ECM Core
//!
//! HTTP resilience and recovery logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for identity, transport, storage and UI
//! - Single-flight token refresh and refresh failure classification
//! - The request interceptor, response recovery state machine and pipeline
//! - Session expiration handling and marker access
//! - Preview job failure classification
//!
//! ## Architecture Principles
//! - Depends only on `ecm-common` and `ecm-domain`
//! - No HTTP, filesystem or UI code
//! - All external dependencies via traits

pub mod auth;
pub mod http;
pub mod ports;
pub mod preview;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use auth::{
    should_logout, AuthBootstrap, BootstrapError, RefreshError, RefreshOutcome,
    TokenRefreshCoordinator,
};
pub use http::{
    RecoveryState, RequestLifecycleInterceptor, ResilientPipeline, ResponseRecoveryStateMachine,
};
pub use ports::{IdentityClient, Navigator, Notifier, SessionStore, Transport};
pub use preview::AsyncJobFailureClassifier;
pub use session::{
    ExpiryAction, MemorySessionStore, RedirectFailurePolicy, SessionExpirationGuard, SessionMarkers,
};
