//! JWT session token encoding and verification.
//!
//! Verification is split in two: [`TokenCodec::verify`] checks signature and structure only,
//! [`TokenCodec::is_expired`] reads `exp` without trusting the signature. Callers decide which
//! checks a given operation needs.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use thiserror::Error;
use uuid::Uuid;

use crate::{config::Config, errors::Error};

/// JWT session claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,        // Subject (username)
    pub roles: Vec<String>, // Role names at issue time
    pub exp: i64,           // Expiration time
    pub iat: i64,           // Issued at
    pub jti: Uuid,          // Unique per issue
}

impl SessionClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whole seconds left until `exp`, zero once it has passed.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.exp - now.timestamp()).max(0)
    }
}

/// A freshly signed token and its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not verify")]
    InvalidSignature,
    #[error("token is malformed: {0}")]
    Malformed(String),
}

/// Signs and verifies session tokens with a single HS256 key.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret = config.secret_key.as_deref().filter(|s| !s.is_empty()).ok_or_else(|| Error::Internal {
            operation: "build token codec: secret_key is required".to_string(),
        })?;
        Ok(Self::new(secret.as_bytes()))
    }

    /// Sign a token for `subject` that expires `ttl` from now.
    pub fn issue(&self, subject: &str, roles: &[String], ttl: Duration) -> Result<IssuedToken, Error> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::Internal {
            operation: format!("convert session ttl: {e}"),
        })?;
        let expires_at = now + ttl;

        let claims = SessionClaims {
            sub: subject.to_string(),
            roles: roles.to_vec(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| Error::Internal {
            operation: format!("create JWT: {e}"),
        })?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    /// Check signature and structure. Expiry is deliberately not checked here.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })
    }

    /// Whether `token` is past its `exp`. Anything unparseable counts as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        match decode::<ExpiryOnly>(token, &DecodingKey::from_secret(&[]), &validation) {
            Ok(data) => Utc::now().timestamp() >= data.claims.exp,
            Err(_) => true,
        }
    }
}

#[derive(Deserialize)]
struct ExpiryOnly {
    exp: i64,
}

/// Compare two byte strings in time independent of where they differ.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
