//! Configuration types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    AUTH_REDIRECT_FAILURE_COOLDOWN_MS, AUTH_REDIRECT_FAILURE_WINDOW_MS,
    AUTH_REDIRECT_MAX_AUTO_ATTEMPTS, DEFAULT_BASE_URL, DEFAULT_CONTENT_TYPE, DEFAULT_LOGIN_PATH,
    LOGIN_IN_PROGRESS_TIMEOUT_MS,
};
use crate::types::OperationClass;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcmConfig {
    pub http: HttpConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeouts: TimeoutBudgets,
    pub content_type: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeouts: TimeoutBudgets::default(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

/// Per-operation-class timeout budgets, in milliseconds
///
/// Transfer budgets are an order of magnitude larger than the JSON budgets
/// so large files do not trip the timeout retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutBudgets {
    pub read_ms: u64,
    pub write_ms: u64,
    pub upload_ms: u64,
    pub download_ms: u64,
}

impl Default for TimeoutBudgets {
    fn default() -> Self {
        Self { read_ms: 30_000, write_ms: 30_000, upload_ms: 300_000, download_ms: 300_000 }
    }
}

impl TimeoutBudgets {
    /// Budget for one attempt of the given operation class
    pub fn budget(&self, class: OperationClass) -> Duration {
        let millis = match class {
            OperationClass::Read => self.read_ms,
            OperationClass::Write => self.write_ms,
            OperationClass::Upload => self.upload_ms,
            OperationClass::Download => self.download_ms,
        };
        Duration::from_millis(millis)
    }
}

/// Authentication and bootstrap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub refresh_path: String,
    pub login_path: String,
    pub refresh_threshold_seconds: i64,
    pub init_timeout_ms: u64,
    pub init_max_attempts: u32,
    pub init_retry_delay_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/auth/refresh".to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            refresh_threshold_seconds: 30,
            init_timeout_ms: 15_000,
            init_max_attempts: 2,
            init_retry_delay_ms: 800,
        }
    }
}

impl AuthConfig {
    /// Per-attempt init timeout
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    /// Delay between init attempts
    pub fn init_retry_delay(&self) -> Duration {
        Duration::from_millis(self.init_retry_delay_ms)
    }
}

/// Session marker storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backing file for persistent-scope markers; in-memory when unset
    pub storage_path: Option<PathBuf>,
    pub login_in_progress_timeout_ms: u64,
    /// How long automatic redirects stay paused after the attempt cap is hit
    pub redirect_failure_cooldown_ms: u64,
    /// Failed automatic redirects allowed inside one failure window
    pub redirect_max_auto_attempts: u32,
    /// Failures further apart than this start a new count
    pub redirect_failure_window_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            login_in_progress_timeout_ms: LOGIN_IN_PROGRESS_TIMEOUT_MS,
            redirect_failure_cooldown_ms: AUTH_REDIRECT_FAILURE_COOLDOWN_MS,
            redirect_max_auto_attempts: AUTH_REDIRECT_MAX_AUTO_ATTEMPTS,
            redirect_failure_window_ms: AUTH_REDIRECT_FAILURE_WINDOW_MS,
        }
    }
}

impl SessionConfig {
    /// Pause after the redirect failure cap is reached
    pub fn redirect_failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.redirect_failure_cooldown_ms)
    }

    /// Window in which redirect failures accumulate
    pub fn redirect_failure_window(&self) -> Duration {
        Duration::from_millis(self.redirect_failure_window_ms)
    }
}

/// Parse a positive integer setting, falling back on anything unusable
///
/// Missing, non-numeric, non-finite and non-positive values return
/// `fallback`. Fractional values are floored.
pub fn resolve_positive_int(raw: Option<&str>, fallback: u64) -> u64 {
    let Some(raw) = raw else {
        return fallback;
    };

    match raw.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed > 0.0 => {
            let floored = parsed.floor();
            if floored < 1.0 {
                fallback
            } else if floored >= u64::MAX as f64 {
                u64::MAX
            } else {
                floored as u64
            }
        }
        _ => fallback,
    }
}
