use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use coachgate_core::UserId;

use crate::Role;

/// Verified bearer-token claims.
///
/// Produced only by a [`crate::TokenVerifier`]; lives for one request. The
/// embedded role is a routing hint only: authorization uses the role held by
/// the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject / principal identifier.
    pub subject_id: UserId,

    /// Role at issue time.
    pub role: Role,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Allowed clock skew between issuer and verifier.
pub const ISSUED_AT_LEEWAY_SECS: i64 = 60;

/// Deterministically validate the time window of decoded claims.
///
/// Signature verification happens before this; this only checks the claims.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now + chrono::Duration::seconds(ISSUED_AT_LEEWAY_SECS) < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(issued_at: DateTime<Utc>, ttl: Duration) -> TokenClaims {
        TokenClaims {
            subject_id: UserId::new(),
            role: Role::Client,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[test]
    fn valid_window_passes() {
        let now = Utc::now();
        assert_eq!(validate_claims(&claims(now, Duration::minutes(5)), now), Ok(()));
    }

    #[test]
    fn expiry_instant_is_expired() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(5), Duration::minutes(5));
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let c = claims(now, Duration::zero());
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::InvalidTimeWindow));
    }

    #[test]
    fn small_skew_is_tolerated_but_future_tokens_are_not() {
        let now = Utc::now();
        let skewed = claims(now + Duration::seconds(30), Duration::minutes(5));
        assert_eq!(validate_claims(&skewed, now), Ok(()));

        let future = claims(now + Duration::minutes(10), Duration::minutes(5));
        assert_eq!(validate_claims(&future, now), Err(TokenValidationError::NotYetValid));
    }
}
