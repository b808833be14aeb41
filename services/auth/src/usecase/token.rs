//! Stateless signed bearer credentials (HS256 JWT).
//!
//! Bulk invalidation works through the `tgen` claim: callers must compare it
//! with the account's current token generation. The issuer never does, since
//! it has no store.

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::clock::SharedClock;
use crate::domain::types::AccountStatus;
use crate::error::AuthServiceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Account id (UUID string).
    pub sub: String,
    pub role: String,
    pub status: AccountStatus,
    /// Account token generation at issuance.
    pub tgen: u64,
    pub iat: i64,
    pub exp: i64,
}

impl CredentialClaims {
    pub fn subject_id(&self) -> Result<Uuid, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Malformed)
    }

    pub fn matches_generation(&self, current: u64) -> bool {
        self.tgen == current
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("bad signature")]
    BadSignature,
    #[error("malformed token")]
    Malformed,
}

impl From<TokenError> for AuthServiceError {
    fn from(_: TokenError) -> Self {
        AuthServiceError::InvalidToken
    }
}

#[derive(Clone)]
pub struct SignedCredentialIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    clock: SharedClock,
}

impl SignedCredentialIssuer {
    pub fn new(secret: &str, clock: SharedClock) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            clock,
        }
    }

    /// Returns the token and its expiry (seconds since epoch).
    pub fn issue(
        &self,
        subject_id: Uuid,
        role: &str,
        status: AccountStatus,
        token_generation: u64,
        ttl: Duration,
    ) -> Result<(String, i64), AuthServiceError> {
        let now = self.clock.now();
        let claims = CredentialClaims {
            sub: subject_id.to_string(),
            role: role.to_owned(),
            status,
            tgen: token_generation,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthServiceError::Internal(e.into()))?;
        Ok((token, claims.exp))
    }

    /// Checks signature and expiry against the injected clock.
    pub fn verify(&self, token: &str) -> Result<CredentialClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock, not the system clock.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<CredentialClaims>(token, &self.decoding, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            },
        )?;

        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}
