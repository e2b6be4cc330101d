//! Decoded access token claims
//!
//! Decoding reads the payload segment of a JWT only. Signatures are not
//! verified; the claims are used for scheduling refreshes and for display,
//! never for authorization decisions.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{EcmError, Result};

/// Claims read from an access token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub sid: Option<String>,
    pub acr: Option<String>,
    #[serde(default)]
    pub amr: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Deserialize)]
struct RawClaims {
    exp: Option<i64>,
    iat: Option<i64>,
    sid: Option<String>,
    acr: Option<String>,
    #[serde(default)]
    amr: Vec<String>,
    #[serde(default)]
    roles: Vec<String>,
    realm_access: Option<RealmAccess>,
}

#[derive(Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT
    pub fn decode(token: &str) -> Result<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| EcmError::InvalidInput("token has no payload segment".into()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| EcmError::InvalidInput(format!("token payload is not base64url: {e}")))?;
        let raw: RawClaims = serde_json::from_slice(&bytes)?;

        let roles = match raw.realm_access {
            Some(realm) if !realm.roles.is_empty() => realm.roles,
            _ => raw.roles,
        };

        Ok(Self { exp: raw.exp, iat: raw.iat, sid: raw.sid, acr: raw.acr, amr: raw.amr, roles })
    }

    /// Seconds until expiry, negative once expired
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.exp.map(|exp| exp - now.timestamp())
    }

    /// Whether the token expires within `seconds` of `now`
    ///
    /// Tokens without an `exp` claim are treated as due.
    pub fn expires_within(&self, seconds: i64, now: DateTime<Utc>) -> bool {
        self.seconds_until_expiry(now).map_or(true, |remaining| remaining <= seconds)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|candidate| candidate == role)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn token_with(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn decodes_realm_roles() {
        let token = token_with(json!({
            "exp": 1_700_000_300,
            "iat": 1_700_000_000,
            "sid": "abc",
            "acr": "1",
            "amr": ["pwd"],
            "realm_access": { "roles": ["admin", "user"] },
        }));

        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.exp, Some(1_700_000_300));
        assert_eq!(claims.sid.as_deref(), Some("abc"));
        assert_eq!(claims.amr, vec!["pwd"]);
        assert!(claims.has_role("admin"));
    }

    #[test]
    fn falls_back_to_top_level_roles() {
        let token = token_with(json!({ "roles": ["viewer"] }));
        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.roles, vec!["viewer"]);
        assert_eq!(claims.exp, None);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(TokenClaims::decode("opaque"), Err(EcmError::InvalidInput(_))));
        assert!(TokenClaims::decode("a.!!!.c").is_err());
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain"));
        assert!(matches!(TokenClaims::decode(&not_json), Err(EcmError::Serialization(_))));
    }

    #[test]
    fn expiry_window() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let claims = TokenClaims { exp: Some(1_700_000_020), ..TokenClaims::default() };

        assert_eq!(claims.seconds_until_expiry(now), Some(20));
        assert!(claims.expires_within(30, now));
        assert!(!claims.expires_within(10, now));
        assert!(TokenClaims::default().expires_within(30, now));
    }
}
