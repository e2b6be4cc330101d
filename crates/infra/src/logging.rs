//! Tracing subscriber installation

use ecm_domain::{EcmError, Result};
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered at `level`
///
/// `RUST_LOG` wins over `level` when set. An unparsable `level` falls back
/// to `info`. Fails if a global subscriber is already installed.
pub fn init_tracing(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .try_init()
        .map_err(|e| EcmError::Internal(format!("failed to install tracing subscriber: {e}")))
}

/// Same as [`init_tracing`] with JSON-formatted events
pub fn init_json_tracing(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(level))
        .try_init()
        .map_err(|e| EcmError::Internal(format!("failed to install tracing subscriber: {e}")))
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
