//! Client-side reading of the access token's expiry.
//!
//! The token is a JWT signed by the server. The client never verifies the
//! signature; it only peeks at the `exp` claim so it can skip requests that
//! are certain to be rejected. A token whose expiry cannot be read is
//! passed through and the server decides.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Tokens within this window of their expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// What the client can tell about a token's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenExpiry {
    /// The token is opaque or carries no `exp` claim.
    Unknown,
    /// The token is valid until the given instant.
    ValidUntil(DateTime<Utc>),
    /// The token expired (or is about to) at the given instant.
    Expired(DateTime<Utc>),
}

impl TokenExpiry {
    /// Whether a request with this token is worth sending.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        !matches!(self, Self::Expired(_))
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Decode the `exp` claim of a JWT without verifying it.
#[must_use]
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// Classify a token against `now`.
#[must_use]
pub fn expiry(token: &str, now: DateTime<Utc>) -> TokenExpiry {
    match expires_at(token) {
        None => TokenExpiry::Unknown,
        Some(exp) if exp - Duration::seconds(EXPIRY_SKEW_SECS) <= now => TokenExpiry::Expired(exp),
        Some(exp) => TokenExpiry::ValidUntil(exp),
    }
}
