//! Auth initialization with timeout and bounded retry

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ecm_common::observability::log_recovery_event;
use ecm_domain::{AuthConfig, EcmError, InitStatus};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::ports::IdentityClient;
use crate::session::SessionMarkers;

/// Auth initialization failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    #[error("auth initialization timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("auth initialization failed: {0}")]
    Failed(#[from] EcmError),
}

/// Retry policy for [`run_init_with_retry`]
pub struct InitRetryOptions<'a> {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Called with the failed attempt number before each retry
    pub on_retry: Option<Box<dyn Fn(u32, &BootstrapError) + Send + Sync + 'a>>,
}

impl Default for InitRetryOptions<'_> {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

impl InitRetryOptions<'_> {
    /// Policy from the `auth` config section
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            timeout: config.init_timeout(),
            max_attempts: config.init_max_attempts,
            retry_delay: config.init_retry_delay(),
            on_retry: None,
        }
    }
}

/// Resolve `task` or fail with [`BootstrapError::Timeout`]
pub async fn with_init_timeout<T, F>(task: F, timeout: Duration) -> Result<T, BootstrapError>
where
    F: Future<Output = ecm_domain::Result<T>>,
{
    match tokio::time::timeout(timeout, task).await {
        Ok(result) => result.map_err(BootstrapError::Failed),
        Err(_) => Err(BootstrapError::Timeout(timeout)),
    }
}

/// Run `factory` up to `max_attempts` times, each under the init timeout
///
/// Sleeps `retry_delay` between attempts. The last attempt's error is
/// returned. `max_attempts` of zero is treated as one.
pub async fn run_init_with_retry<T, F, Fut>(
    mut factory: F,
    options: InitRetryOptions<'_>,
) -> Result<T, BootstrapError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ecm_domain::Result<T>>,
{
    let attempts = options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match with_init_timeout(factory(), options.timeout).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!(attempt, max_attempts = attempts, error = %err, "auth initialization attempt failed, retrying");
                log_recovery_event(
                    "auth.bootstrap.retry",
                    json!({ "attempt": attempt, "maxAttempts": attempts, "error": err.to_string() }),
                );
                if let Some(on_retry) = &options.on_retry {
                    on_retry(attempt, &err);
                }
                tokio::time::sleep(options.retry_delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Auth initialization that records its outcome in the session markers
pub struct AuthBootstrap {
    markers: SessionMarkers,
    config: AuthConfig,
}

impl AuthBootstrap {
    /// Bootstrap writing its outcome to `markers`
    pub fn new(markers: SessionMarkers, config: AuthConfig) -> Self {
        Self { markers, config }
    }

    /// Run `factory` under the configured retry policy
    ///
    /// Success clears login progress and the init status, keeping a
    /// `session_expired` marker so the login surface can still explain it.
    /// Timeouts record `timeout`; other failures record `error`.
    pub async fn initialize<T, F, Fut>(&self, factory: F) -> Result<T, BootstrapError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ecm_domain::Result<T>>,
    {
        let result = run_init_with_retry(factory, InitRetryOptions::from_config(&self.config)).await;

        let recorded = match &result {
            Ok(_) => {
                info!("auth initialization complete");
                self.markers
                    .clear_login_progress()
                    .and_then(|()| self.markers.clear_init_status(true))
            }
            Err(BootstrapError::Timeout(after)) => {
                warn!(after_ms = after.as_millis() as u64, "auth initialization timed out");
                self.markers.set_init_status(InitStatus::Timeout)
            }
            Err(BootstrapError::Failed(err)) => {
                warn!(error = %err, "auth initialization failed");
                self.markers.set_init_status(InitStatus::Error)
            }
        };
        if let Err(err) = recorded {
            warn!(error = %err, "failed to record auth initialization outcome");
        }
        result
    }

    /// Initialize by refreshing the identity client's session
    ///
    /// Returns whether a token is available afterwards.
    pub async fn initialize_identity(
        &self,
        identity: Arc<dyn IdentityClient>,
    ) -> Result<bool, BootstrapError> {
        self.initialize(|| {
            let identity = Arc::clone(&identity);
            async move {
                let refreshed =
                    identity.refresh().await.map_err(|err| EcmError::Auth(err.to_string()))?;
                Ok::<_, EcmError>(refreshed.is_some() || identity.token().is_some())
            }
        })
        .await
    }
}
