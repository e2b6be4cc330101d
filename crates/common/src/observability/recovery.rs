//! Auth recovery debug events
//!
//! Enabled when `ECM_DEBUG_RECOVERY=1` is set at startup, or at runtime via
//! [`set_recovery_debug`].

use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use tracing::info;

/// Environment variable that enables recovery debug events
pub const RECOVERY_DEBUG_ENV: &str = "ECM_DEBUG_RECOVERY";

/// Replacement for sensitive payload values
pub const REDACTED: &str = "[redacted]";

const SENSITIVE_KEYS: &[&str] =
    &["token", "accessToken", "refreshToken", "idToken", "authorization", "Authorization"];

static DEBUG_ENABLED: Lazy<AtomicBool> = Lazy::new(|| {
    let from_env = std::env::var(RECOVERY_DEBUG_ENV).map(|v| v == "1").unwrap_or(false);
    AtomicBool::new(from_env)
});

/// Check whether recovery events are currently emitted
pub fn is_recovery_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Toggle recovery events at runtime
pub fn set_recovery_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Recursively replace values stored under sensitive keys
#[must_use]
pub fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sanitize_payload).collect()),
        Value::Object(record) => {
            let sanitized: Map<String, Value> = record
                .iter()
                .map(|(key, inner)| {
                    let replacement = if SENSITIVE_KEYS.contains(&key.as_str()) {
                        Value::String(REDACTED.to_string())
                    } else {
                        sanitize_payload(inner)
                    };
                    (key.clone(), replacement)
                })
                .collect();
            Value::Object(sanitized)
        }
        other => other.clone(),
    }
}

/// Emit a recovery event with a sanitized payload
///
/// No-op unless recovery debugging is enabled. Empty payloads log the event
/// name alone.
pub fn log_recovery_event(event: &str, payload: Value) {
    if !is_recovery_debug_enabled() {
        return;
    }

    let safe = sanitize_payload(&payload);
    let has_fields = match &safe {
        Value::Object(record) => !record.is_empty(),
        Value::Null => false,
        _ => true,
    };

    if has_fields {
        info!(target: "ecm::auth_recovery", event, payload = %safe, "auth recovery event");
    } else {
        info!(target: "ecm::auth_recovery", event, "auth recovery event");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn redacts_sensitive_keys_recursively() {
        let payload = json!({
            "method": "GET",
            "token": "abc",
            "headers": { "Authorization": "Bearer abc", "Accept": "application/json" },
            "attempts": [{ "refreshToken": "r1" }, { "url": "/documents" }],
        });

        let safe = sanitize_payload(&payload);

        assert_eq!(safe["method"], "GET");
        assert_eq!(safe["token"], REDACTED);
        assert_eq!(safe["headers"]["Authorization"], REDACTED);
        assert_eq!(safe["headers"]["Accept"], "application/json");
        assert_eq!(safe["attempts"][0]["refreshToken"], REDACTED);
        assert_eq!(safe["attempts"][1]["url"], "/documents");
    }

    #[test]
    fn leaves_scalars_untouched() {
        assert_eq!(sanitize_payload(&json!("plain")), json!("plain"));
        assert_eq!(sanitize_payload(&json!(42)), json!(42));
        assert_eq!(sanitize_payload(&Value::Null), Value::Null);
    }

    #[test]
    fn logging_is_safe_when_enabled_or_disabled() {
        set_recovery_debug(true);
        assert!(is_recovery_debug_enabled());
        log_recovery_event("api.session_expired.mark", json!({ "pathname": "/login" }));
        log_recovery_event("auth.bootstrap.start", Value::Null);

        set_recovery_debug(false);
        assert!(!is_recovery_debug_enabled());
        log_recovery_event("api.session_expired.mark", json!({ "token": "secret" }));
    }
}
