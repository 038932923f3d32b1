use std::fmt;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;

use super::claims::MediaTokenClaims;
use super::signing_key::{PrivateJwk, SigningKeyError};
use super::verifier::{MediaTokenVerifier, TokenVerificationError};

/// Opaque signing handle used by the token issuer.
pub trait MediaTokenSigner: Send + Sync {
    fn key_id(&self) -> &str;

    /// Produce a compact RS256 token over the claims.
    fn sign(&self, claims: &MediaTokenClaims) -> Result<String, SigningKeyError>;
}

/// RSA signing key converted from a private JWK.
///
/// Conversion happens once; the key is read-only afterwards and shared
/// behind an `Arc`.
#[derive(Clone)]
pub struct RsaMediaSigner {
    key_id: String,
    encoding_key: EncodingKey,
    modulus: String,
    exponent: String,
}

impl fmt::Debug for RsaMediaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaMediaSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RsaMediaSigner {
    /// Build the signer from raw or base64-wrapped JWK material.
    ///
    /// `key_id` overrides the JWK's own `kid`. One of them must be present.
    pub fn from_jwk(key_id: Option<&str>, raw_jwk: &str) -> Result<Self, SigningKeyError> {
        let jwk = PrivateJwk::parse(raw_jwk)?;

        let key_id = key_id
            .map(str::trim)
            .filter(|kid| !kid.is_empty())
            .or(jwk.kid.as_deref())
            .map(str::to_owned)
            .ok_or(SigningKeyError::MissingComponent("kid"))?;

        let private_key = jwk.to_private_key()?;
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| SigningKeyError::InvalidKey(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        Ok(Self {
            key_id,
            encoding_key,
            modulus: jwk.n.trim().to_string(),
            exponent: jwk.e.trim().to_string(),
        })
    }

    /// Verifier for tokens produced by this signer.
    pub fn verifier(&self) -> Result<MediaTokenVerifier, TokenVerificationError> {
        MediaTokenVerifier::from_components(&self.key_id, &self.modulus, &self.exponent)
    }
}

impl MediaTokenSigner for RsaMediaSigner {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn sign(&self, claims: &MediaTokenClaims) -> Result<String, SigningKeyError> {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = None;
        header.kid = Some(self.key_id.clone());

        jsonwebtoken::encode(&header, claims, &self.encoding_key)
            .map_err(|e| SigningKeyError::Signing(e.to_string()))
    }
}
