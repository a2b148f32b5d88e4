//! Bearer token inspection.
//!
//! Access tokens are JWT-shaped (`header.payload.signature`). The client
//! never verifies signatures; it only reads the subject and expiry out of
//! the payload so it can refresh before the backend starts rejecting the
//! token. Anything that fails to decode is treated as expired.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// The claims the client cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Decode the payload segment of `token`.
pub fn try_decode(token: &str) -> Result<TokenClaims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(TokenError::Malformed);
    };

    let bytes = URL_SAFE_LENIENT
        .decode(payload)
        .or_else(|_| STANDARD_LENIENT.decode(payload))
        .map_err(|_| TokenError::Encoding)?;

    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| TokenError::Payload)?;
    let object = value.as_object().ok_or(TokenError::Payload)?;

    let subject = match object.get("sub") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let expires_at = object
        .get("exp")
        .and_then(serde_json::Value::as_i64)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    Ok(TokenClaims {
        subject,
        expires_at,
    })
}

/// Decode `token`, returning `None` on any failure.
pub fn decode(token: &str) -> Option<TokenClaims> {
    try_decode(token).ok()
}

/// The token's subject (the backend user id), if any.
pub fn subject(token: &str) -> Option<String> {
    decode(token).and_then(|claims| claims.subject)
}

/// Whether `token` should be considered expired at `now`, treating the last
/// `buffer` before expiry as already expired.
pub fn is_expired_at(token: &str, buffer: Duration, now: DateTime<Utc>) -> bool {
    match decode(token).and_then(|claims| claims.expires_at) {
        Some(expires_at) => expires_at
            .checked_sub_signed(buffer)
            .map_or(true, |deadline| now >= deadline),
        None => true,
    }
}

pub fn is_expired(token: &str, buffer: Duration) -> bool {
    is_expired_at(token, buffer, Utc::now())
}

/// Access/refresh token pair for an authenticated user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    /// Subject of the access token.
    pub fn user_id(&self) -> Option<String> {
        subject(&self.access_token)
    }

    pub fn is_expired(&self, buffer: Duration) -> bool {
        is_expired(&self.access_token, buffer)
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Build an unsigned token with the given claims.
#[cfg(any(test, feature = "test-support"))]
pub fn unsigned_token(subject: &str, expires_at: DateTime<Utc>) -> String {
    let header = URL_SAFE_LENIENT.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = serde_json::json!({ "sub": subject, "exp": expires_at.timestamp() });
    let payload = URL_SAFE_LENIENT.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> Duration {
        Duration::minutes(3)
    }

    #[test]
    fn test_decode_subject_and_expiry() {
        let exp = Utc::now() + Duration::hours(1);
        let token = unsigned_token("42", exp);

        let claims = decode(&token).unwrap();
        assert_eq!(claims.subject.as_deref(), Some("42"));
        assert_eq!(claims.expires_at.unwrap().timestamp(), exp.timestamp());
        assert!(!is_expired(&token, buffer()));
    }

    #[test]
    fn test_numeric_subject() {
        let payload = URL_SAFE_LENIENT.encode(br#"{"sub":42,"exp":4102444800}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(subject(&token).as_deref(), Some("42"));
    }

    #[test]
    fn test_standard_alphabet_with_padding() {
        let payload = base64::engine::general_purpose::STANDARD.encode(br#"{"sub":"7"}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(subject(&token).as_deref(), Some("7"));
    }

    #[test]
    fn test_malformed_tokens_are_expired() {
        for token in ["", "abc", "a.b", "a.b.c.d", "a.!!!.c", "a.bm90IGpzb24.c"] {
            assert!(decode(token).is_none(), "decoded {token:?}");
            assert!(is_expired(token, buffer()), "not expired: {token:?}");
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(try_decode("a.b"), Err(TokenError::Malformed));
        assert_eq!(try_decode("a.!!!.c"), Err(TokenError::Encoding));
        let array = URL_SAFE_LENIENT.encode(b"[1,2]");
        assert_eq!(try_decode(&format!("a.{array}.c")), Err(TokenError::Payload));
    }

    #[test]
    fn test_missing_exp_is_expired() {
        let payload = URL_SAFE_LENIENT.encode(br#"{"sub":"42"}"#);
        let token = format!("h.{payload}.s");
        assert!(decode(&token).is_some());
        assert!(is_expired(&token, buffer()));
    }

    #[test]
    fn test_buffer_window() {
        let now = Utc::now();
        let inside = unsigned_token("1", now + Duration::minutes(2));
        let outside = unsigned_token("1", now + Duration::minutes(10));
        let past = unsigned_token("1", now - Duration::minutes(1));

        assert!(is_expired_at(&inside, buffer(), now));
        assert!(!is_expired_at(&outside, buffer(), now));
        assert!(is_expired_at(&past, buffer(), now));
        assert!(!is_expired_at(&inside, Duration::zero(), now));
    }

    #[test]
    fn test_expiry_near_minimum_date_is_expired() {
        let payload = URL_SAFE_LENIENT.encode(br#"{"sub":"1","exp":-8334601228700}"#);
        let token = format!("h.{payload}.s");
        assert!(decode(&token).unwrap().expires_at.is_some());
        assert!(is_expired(&token, buffer()));
    }

    #[test]
    fn test_credential_debug_redacts() {
        let cred = Credential::new("secret.token.value", Some("refresh".into()));
        let shown = format!("{cred:?}");
        assert!(!shown.contains("secret"));
        assert!(shown.contains("has_refresh_token: true"));
    }
}
