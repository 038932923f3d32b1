use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;

use super::claims::MediaTokenClaims;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenVerificationError {
    #[error("malformed media token: {0}")]
    Malformed(String),

    #[error("media token signature does not verify")]
    InvalidSignature,

    #[error("media token has expired")]
    Expired,

    #[error("media token was signed with unknown key `{0}`")]
    UnknownKey(String),

    #[error("invalid verification key: {0}")]
    InvalidKey(String),
}

impl From<jsonwebtoken::errors::Error> for TokenVerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Public-key side of media tokens, as the delivery network checks them.
///
/// Expiry is enforced with zero leeway: a token is dead at its `exp` second.
#[derive(Clone)]
pub struct MediaTokenVerifier {
    key_id: String,
    decoding_key: DecodingKey,
}

impl fmt::Debug for MediaTokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTokenVerifier")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl MediaTokenVerifier {
    /// From base64url JWK modulus and exponent.
    pub fn from_components(
        key_id: &str,
        modulus: &str,
        exponent: &str,
    ) -> Result<Self, TokenVerificationError> {
        let decoding_key = DecodingKey::from_rsa_components(modulus, exponent)
            .map_err(|e| TokenVerificationError::InvalidKey(e.to_string()))?;
        Ok(Self {
            key_id: key_id.to_string(),
            decoding_key,
        })
    }

    /// From a PEM-encoded RSA public key.
    pub fn from_pem(key_id: &str, pem: &[u8]) -> Result<Self, TokenVerificationError> {
        let decoding_key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| TokenVerificationError::InvalidKey(e.to_string()))?;
        Ok(Self {
            key_id: key_id.to_string(),
            decoding_key,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn verify(&self, token: &str) -> Result<MediaTokenClaims, TokenVerificationError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<MediaTokenClaims, TokenVerificationError> {
        let header = jsonwebtoken::decode_header(token)?;
        match header.kid.as_deref() {
            Some(kid) if kid == self.key_id => {}
            Some(kid) => return Err(TokenVerificationError::UnknownKey(kid.to_string())),
            None => return Err(TokenVerificationError::Malformed("missing kid".into())),
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        // Expiry is checked against `now` below so callers can pin the clock
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let data = jsonwebtoken::decode::<MediaTokenClaims>(token, &self.decoding_key, &validation)?;
        let claims = data.claims;

        if claims.kid != self.key_id {
            return Err(TokenVerificationError::UnknownKey(claims.kid));
        }
        if claims.exp <= now.timestamp() {
            return Err(TokenVerificationError::Expired);
        }
        Ok(claims)
    }
}
