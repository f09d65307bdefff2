//! Bearer credential parsing and HS256 verification.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use coachgate_core::UserId;

use crate::claims::{TokenValidationError, validate_claims};
use crate::{AuthFailure, Denial, Role, TokenClaims};

/// Extract the token from an `Authorization` header value.
///
/// Absence or a malformed scheme is an expected input and maps to
/// [`Denial::AuthRequired`], not to an authentication failure.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, Denial> {
    let header = header.ok_or(Denial::AuthRequired)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(Denial::AuthRequired)?
        .trim();
    if token.is_empty() {
        return Err(Denial::AuthRequired);
    }
    Ok(token)
}

/// Validates a bearer token into typed claims.
///
/// Implementations are pure: no network or store access.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, Denial>;
}

/// On-the-wire claim set. Every field is optional so that a payload missing
/// a claim is reported as malformed rather than as a decoding failure.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

impl WireClaims {
    fn into_claims(self) -> Option<TokenClaims> {
        let subject_id: UserId = self.sub?.parse().ok()?;
        let role: Role = self.role?.parse().ok()?;
        let issued_at = Utc.timestamp_opt(self.iat?, 0).single()?;
        let expires_at = Utc.timestamp_opt(self.exp?, 0).single()?;
        Some(TokenClaims {
            subject_id,
            role,
            issued_at,
            expires_at,
        })
    }
}

/// HMAC-SHA256 verifier bound to a server-held secret.
pub struct Hs256TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock after decoding.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = HashSet::new();
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl TokenVerifier for Hs256TokenVerifier {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, Denial> {
        let data = jsonwebtoken::decode::<WireClaims>(token, &self.key, &self.validation)
            .map_err(|e| Denial::AuthFailed(classify(e.kind())))?;

        let claims = data
            .claims
            .into_claims()
            .ok_or(Denial::AuthFailed(AuthFailure::MalformedPayload))?;

        validate_claims(&claims, now).map_err(|e| match e {
            TokenValidationError::Expired => Denial::AuthFailed(AuthFailure::Expired),
            TokenValidationError::NotYetValid | TokenValidationError::InvalidTimeWindow => {
                Denial::AuthFailed(AuthFailure::MalformedPayload)
            }
        })?;

        Ok(claims)
    }
}

fn classify(kind: &ErrorKind) -> AuthFailure {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthFailure::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthFailure::Expired,
        _ => AuthFailure::MalformedPayload,
    }
}

/// Sign `claims` with HS256 so that [`Hs256TokenVerifier`] accepts them.
pub fn encode_token(
    claims: &TokenClaims,
    secret: impl AsRef<[u8]>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let wire = WireClaims {
        sub: Some(claims.subject_id.to_string()),
        role: Some(claims.role.as_str().to_string()),
        iat: Some(claims.issued_at.timestamp()),
        exp: Some(claims.expires_at.timestamp()),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &wire,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}
