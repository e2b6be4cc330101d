//! Token refresh coordination and auth bootstrap

pub mod bootstrap;
pub mod errors;
pub mod refresh_coordinator;
pub mod refresh_failure;

pub use bootstrap::{
    run_init_with_retry, with_init_timeout, AuthBootstrap, BootstrapError, InitRetryOptions,
};
pub use errors::RefreshError;
pub use refresh_coordinator::{RefreshOutcome, TokenRefreshCoordinator};
pub use refresh_failure::should_logout;
