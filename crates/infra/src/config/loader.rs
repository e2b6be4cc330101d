//! Configuration loader
//!
//! Loads client configuration from a file and environment variables.
//!
//! ## Loading Strategy
//! 1. Use the explicit file path when given, otherwise search the standard
//!    locations
//! 2. Without a file, start from the built-in defaults
//! 3. Apply environment overrides on top
//!
//! ## Environment Variables
//! - `ECM_API_URL`: API base URL
//! - `ECM_TIMEOUT_READ_MS`, `ECM_TIMEOUT_WRITE_MS`, `ECM_TIMEOUT_UPLOAD_MS`,
//!   `ECM_TIMEOUT_DOWNLOAD_MS`: per-class timeout budgets
//! - `ECM_AUTH_INIT_TIMEOUT_MS`: auth initialization timeout
//! - `ECM_AUTH_INIT_MAX_ATTEMPTS`: auth initialization attempts
//! - `ECM_AUTH_INIT_RETRY_DELAY_MS`: delay between initialization attempts
//! - `ECM_SESSION_STORAGE_PATH`: file for persistent session markers
//! - `ECM_AUTH_REDIRECT_FAILURE_COOLDOWN_MS`, `ECM_AUTH_REDIRECT_MAX_AUTO_ATTEMPTS`,
//!   `ECM_AUTH_REDIRECT_FAILURE_WINDOW_MS`: automatic login redirect back-off
//!
//! Numeric values that are missing, non-numeric or not positive keep the
//! current value.
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./ecm.json` or `./ecm.toml`
//! 2. `./config.json` or `./config.toml`

use std::path::{Path, PathBuf};

use ecm_domain::{resolve_positive_int, EcmConfig, EcmError, Result};

pub const ENV_API_URL: &str = "ECM_API_URL";
pub const ENV_TIMEOUT_READ_MS: &str = "ECM_TIMEOUT_READ_MS";
pub const ENV_TIMEOUT_WRITE_MS: &str = "ECM_TIMEOUT_WRITE_MS";
pub const ENV_TIMEOUT_UPLOAD_MS: &str = "ECM_TIMEOUT_UPLOAD_MS";
pub const ENV_TIMEOUT_DOWNLOAD_MS: &str = "ECM_TIMEOUT_DOWNLOAD_MS";
pub const ENV_AUTH_INIT_TIMEOUT_MS: &str = "ECM_AUTH_INIT_TIMEOUT_MS";
pub const ENV_AUTH_INIT_MAX_ATTEMPTS: &str = "ECM_AUTH_INIT_MAX_ATTEMPTS";
pub const ENV_AUTH_INIT_RETRY_DELAY_MS: &str = "ECM_AUTH_INIT_RETRY_DELAY_MS";
pub const ENV_SESSION_STORAGE_PATH: &str = "ECM_SESSION_STORAGE_PATH";
pub const ENV_REDIRECT_FAILURE_COOLDOWN_MS: &str = "ECM_AUTH_REDIRECT_FAILURE_COOLDOWN_MS";
pub const ENV_REDIRECT_MAX_AUTO_ATTEMPTS: &str = "ECM_AUTH_REDIRECT_MAX_AUTO_ATTEMPTS";
pub const ENV_REDIRECT_FAILURE_WINDOW_MS: &str = "ECM_AUTH_REDIRECT_FAILURE_WINDOW_MS";

/// Load configuration with the full fallback strategy
///
/// # Errors
/// Returns `EcmError::Config` if an explicit file is missing or any file
/// that was found cannot be parsed.
pub fn load(path: Option<PathBuf>) -> Result<EcmConfig> {
    let base = match path.or_else(find_config_path) {
        Some(path) => load_from_file(&path)?,
        None => {
            tracing::debug!("No config file found, using defaults");
            EcmConfig::default()
        }
    };

    Ok(apply_env_overrides(base))
}

/// Defaults with environment overrides applied
pub fn load_from_env() -> EcmConfig {
    apply_env_overrides(EcmConfig::default())
}

/// Load configuration from a file
///
/// Format is detected by extension (`.json` or `.toml`). Missing sections
/// and fields take their defaults.
///
/// # Errors
/// Returns `EcmError::Config` if the file cannot be read or parsed.
pub fn load_from_file(path: &Path) -> Result<EcmConfig> {
    if !path.exists() {
        return Err(EcmError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| EcmError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<EcmConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| EcmError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| EcmError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(EcmError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// First existing config file in the working directory, if any
pub fn find_config_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_in(&cwd)
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    ["ecm.json", "ecm.toml", "config.json", "config.toml"]
        .into_iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Overlay environment variables onto `config`
pub fn apply_env_overrides(mut config: EcmConfig) -> EcmConfig {
    if let Some(url) = env_string(ENV_API_URL) {
        config.http.base_url = url;
    }

    let timeouts = &mut config.http.timeouts;
    timeouts.read_ms = env_positive(ENV_TIMEOUT_READ_MS, timeouts.read_ms);
    timeouts.write_ms = env_positive(ENV_TIMEOUT_WRITE_MS, timeouts.write_ms);
    timeouts.upload_ms = env_positive(ENV_TIMEOUT_UPLOAD_MS, timeouts.upload_ms);
    timeouts.download_ms = env_positive(ENV_TIMEOUT_DOWNLOAD_MS, timeouts.download_ms);

    let auth = &mut config.auth;
    auth.init_timeout_ms = env_positive(ENV_AUTH_INIT_TIMEOUT_MS, auth.init_timeout_ms);
    auth.init_max_attempts = env_positive_u32(ENV_AUTH_INIT_MAX_ATTEMPTS, auth.init_max_attempts);
    auth.init_retry_delay_ms = env_positive(ENV_AUTH_INIT_RETRY_DELAY_MS, auth.init_retry_delay_ms);

    let session = &mut config.session;
    if let Some(path) = env_string(ENV_SESSION_STORAGE_PATH) {
        session.storage_path = Some(PathBuf::from(path));
    }
    session.redirect_failure_cooldown_ms =
        env_positive(ENV_REDIRECT_FAILURE_COOLDOWN_MS, session.redirect_failure_cooldown_ms);
    session.redirect_max_auto_attempts =
        env_positive_u32(ENV_REDIRECT_MAX_AUTO_ATTEMPTS, session.redirect_max_auto_attempts);
    session.redirect_failure_window_ms =
        env_positive(ENV_REDIRECT_FAILURE_WINDOW_MS, session.redirect_failure_window_ms);

    config
}

/// Non-empty, trimmed environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_positive(key: &str, fallback: u64) -> u64 {
    resolve_positive_int(std::env::var(key).ok().as_deref(), fallback)
}

fn env_positive_u32(key: &str, fallback: u32) -> u32 {
    u32::try_from(env_positive(key, u64::from(fallback))).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::tempdir;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 12] = [
        ENV_API_URL,
        ENV_TIMEOUT_READ_MS,
        ENV_TIMEOUT_WRITE_MS,
        ENV_TIMEOUT_UPLOAD_MS,
        ENV_TIMEOUT_DOWNLOAD_MS,
        ENV_AUTH_INIT_TIMEOUT_MS,
        ENV_AUTH_INIT_MAX_ATTEMPTS,
        ENV_AUTH_INIT_RETRY_DELAY_MS,
        ENV_SESSION_STORAGE_PATH,
        ENV_REDIRECT_FAILURE_COOLDOWN_MS,
        ENV_REDIRECT_MAX_AUTO_ATTEMPTS,
        ENV_REDIRECT_FAILURE_WINDOW_MS,
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_overrides_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(ENV_API_URL, " https://ecm.example.com/api ");
        std::env::set_var(ENV_TIMEOUT_READ_MS, "5000");
        std::env::set_var(ENV_TIMEOUT_UPLOAD_MS, "600000.9");
        std::env::set_var(ENV_AUTH_INIT_MAX_ATTEMPTS, "4");
        std::env::set_var(ENV_SESSION_STORAGE_PATH, "/tmp/ecm-session.json");

        let config = load_from_env();
        assert_eq!(config.http.base_url, "https://ecm.example.com/api");
        assert_eq!(config.http.timeouts.read_ms, 5_000);
        assert_eq!(config.http.timeouts.write_ms, 30_000);
        assert_eq!(config.http.timeouts.upload_ms, 600_000);
        assert_eq!(config.auth.init_max_attempts, 4);
        assert_eq!(config.session.storage_path, Some(PathBuf::from("/tmp/ecm-session.json")));

        clear_env();
    }

    #[test]
    fn test_env_overrides_redirect_back_off() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(ENV_REDIRECT_FAILURE_COOLDOWN_MS, "60000");
        std::env::set_var(ENV_REDIRECT_MAX_AUTO_ATTEMPTS, "3.7");
        std::env::set_var(ENV_REDIRECT_FAILURE_WINDOW_MS, "0");

        let config = load_from_env();
        assert_eq!(config.session.redirect_failure_cooldown_ms, 60_000);
        assert_eq!(config.session.redirect_max_auto_attempts, 3);
        assert_eq!(config.session.redirect_failure_window_ms, 300_000);

        clear_env();
    }

    #[test]
    fn test_invalid_numbers_keep_fallback() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(ENV_TIMEOUT_READ_MS, "soon");
        std::env::set_var(ENV_TIMEOUT_WRITE_MS, "-10");
        std::env::set_var(ENV_AUTH_INIT_TIMEOUT_MS, "0");
        std::env::set_var(ENV_AUTH_INIT_RETRY_DELAY_MS, "inf");

        let config = load_from_env();
        assert_eq!(config.http.timeouts.read_ms, 30_000);
        assert_eq!(config.http.timeouts.write_ms, 30_000);
        assert_eq!(config.auth.init_timeout_ms, 15_000);
        assert_eq!(config.auth.init_retry_delay_ms, 800);

        clear_env();
    }

    #[test]
    fn test_load_from_file_json_with_partial_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ecm.json");
        std::fs::write(
            &path,
            r#"{ "http": { "base_url": "http://files.local/api", "timeouts": { "read_ms": 1000 } } }"#,
        )
        .unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.http.base_url, "http://files.local/api");
        assert_eq!(config.http.timeouts.read_ms, 1_000);
        assert_eq!(config.http.timeouts.download_ms, 300_000);
        assert_eq!(config.auth.refresh_path, "/auth/refresh");
    }

    #[test]
    fn test_load_from_file_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ecm.toml");
        std::fs::write(
            &path,
            r#"
[auth]
login_path = "/signin"
refresh_threshold_seconds = 60

[session]
login_in_progress_timeout_ms = 10000
"#,
        )
        .unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.auth.login_path, "/signin");
        assert_eq!(config.auth.refresh_threshold_seconds, 60);
        assert_eq!(config.session.login_in_progress_timeout_ms, 10_000);
        assert_eq!(config.http, ecm_domain::HttpConfig::default());
    }

    #[test]
    fn test_load_explicit_file_then_env() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let dir = tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{ "http": { "base_url": "http://file.local" } }"#).unwrap();
        std::env::set_var(ENV_API_URL, "http://env.local");

        let config = load(Some(path)).unwrap();
        assert_eq!(config.http.base_url, "http://env.local");

        clear_env();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Path::new("/nonexistent/ecm.json"));
        assert!(matches!(result, Err(EcmError::Config(_))));

        let result = load(Some(PathBuf::from("/nonexistent/ecm.json")));
        assert!(matches!(result, Err(EcmError::Config(_))));
    }

    #[test]
    fn test_search_prefers_ecm_file() {
        let dir = tempdir().unwrap();
        assert_eq!(find_in(dir.path()), None);

        std::fs::write(dir.path().join("config.toml"), "").unwrap();
        assert_eq!(find_in(dir.path()), Some(dir.path().join("config.toml")));

        std::fs::write(dir.path().join("ecm.toml"), "").unwrap();
        assert_eq!(find_in(dir.path()), Some(dir.path().join("ecm.toml")));
    }

    #[test]
    fn test_parse_config_invalid_json() {
        let result = parse_config(r#"{ "http": "#, Path::new("ecm.json"));
        assert!(matches!(result, Err(EcmError::Config(_))));
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("http: {}", Path::new("ecm.yaml"));
        assert!(matches!(result, Err(EcmError::Config(_))));
    }
}
