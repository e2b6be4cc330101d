//! Client constants
//!
//! Storage keys, marker values and user-facing notices shared by the
//! recovery layer and its adapters.

// Session-scoped storage keys
pub const AUTH_INIT_STATUS_KEY: &str = "ecm_auth_init_status";
pub const LOGIN_IN_PROGRESS_KEY: &str = "ecm_kc_login_in_progress";
pub const LOGIN_IN_PROGRESS_STARTED_AT_KEY: &str = "ecm_kc_login_in_progress_started_at";
pub const AUTH_REDIRECT_FAILURE_COUNT_KEY: &str = "ecm_auth_redirect_failure_count";
pub const AUTH_REDIRECT_LAST_FAILURE_AT_KEY: &str = "ecm_auth_redirect_last_failure_at";

// Persistent storage keys
pub const AUTH_REDIRECT_REASON_KEY: &str = "ecm_auth_redirect_reason";
pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

// Login surface
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const REDIRECT_REASON_PARAM: &str = "reason";
pub const LOGIN_IN_PROGRESS_TIMEOUT_MS: u64 = 45_000;

// Automatic redirect back-off
pub const AUTH_REDIRECT_FAILURE_COOLDOWN_MS: u64 = 30_000;
pub const AUTH_REDIRECT_MAX_AUTO_ATTEMPTS: u32 = 2;
pub const AUTH_REDIRECT_FAILURE_WINDOW_MS: u64 = 300_000;

// Notices
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please login again.";
pub const TIMEOUT_NOTICE: &str = "Request timed out. Please retry.";
pub const GENERIC_FAILURE_NOTICE: &str = "An unexpected error occurred";

// HTTP defaults
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

// Transport error codes
pub const CODE_CONNECTION_ABORTED: &str = "ECONNABORTED";
pub const CODE_TIMED_OUT: &str = "ETIMEDOUT";
pub const CODE_NETWORK: &str = "ERR_NETWORK";
pub const CODE_CANCELED: &str = "ERR_CANCELED";
