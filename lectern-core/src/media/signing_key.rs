use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use rsa::BigUint;
use serde::Deserialize;
use thiserror::Error;

use crate::error::GateError;

#[derive(Debug, Error)]
pub enum SigningKeyError {
    #[error("signing key is neither JSON nor base64-encoded JSON: {0}")]
    Decode(String),

    #[error("unsupported key type `{0}`, expected RSA")]
    UnsupportedKeyType(String),

    #[error("unsupported algorithm `{0}`, expected RS256")]
    UnsupportedAlgorithm(String),

    #[error("signing key is missing the `{0}` component")]
    MissingComponent(&'static str),

    #[error("signing key component `{component}` is not valid base64url: {reason}")]
    InvalidComponent {
        component: &'static str,
        reason: String,
    },

    #[error("invalid RSA private key: {0}")]
    InvalidKey(String),

    #[error("failed to sign media token: {0}")]
    Signing(String),
}

impl From<SigningKeyError> for GateError {
    fn from(err: SigningKeyError) -> Self {
        GateError::Configuration(err.to_string())
    }
}

/// Private RSA key in JWK form.
///
/// Only the fields needed to rebuild the key are kept. CRT parameters
/// (`dp`, `dq`, `qi`) are recomputed from the primes.
#[derive(Clone, Deserialize)]
pub struct PrivateJwk {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    pub n: String,
    pub e: String,
    #[serde(default)]
    d: Option<String>,
    #[serde(default)]
    p: Option<String>,
    #[serde(default)]
    q: Option<String>,
}

impl fmt::Debug for PrivateJwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateJwk")
            .field("kty", &self.kty)
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

impl PrivateJwk {
    /// Accepts raw JSON or base64-wrapped JSON, the two forms key material is
    /// distributed in.
    pub fn parse(raw: &str) -> Result<Self, SigningKeyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SigningKeyError::Decode("empty key material".into()));
        }

        let jwk: Self = if raw.starts_with('{') {
            serde_json::from_str(raw).map_err(|e| SigningKeyError::Decode(e.to_string()))?
        } else {
            let bytes = STANDARD
                .decode(raw)
                .or_else(|_| URL_SAFE.decode(raw))
                .or_else(|_| URL_SAFE_NO_PAD.decode(raw))
                .map_err(|e| SigningKeyError::Decode(e.to_string()))?;
            serde_json::from_slice(&bytes).map_err(|e| SigningKeyError::Decode(e.to_string()))?
        };

        jwk.validate_shape()?;
        Ok(jwk)
    }

    fn validate_shape(&self) -> Result<(), SigningKeyError> {
        if !self.kty.eq_ignore_ascii_case("RSA") {
            return Err(SigningKeyError::UnsupportedKeyType(self.kty.clone()));
        }
        if let Some(alg) = self.alg.as_deref()
            && alg != "RS256"
        {
            return Err(SigningKeyError::UnsupportedAlgorithm(alg.to_string()));
        }
        if self.d.is_none() {
            return Err(SigningKeyError::MissingComponent("d"));
        }
        if self.p.is_none() {
            return Err(SigningKeyError::MissingComponent("p"));
        }
        if self.q.is_none() {
            return Err(SigningKeyError::MissingComponent("q"));
        }
        Ok(())
    }

    pub(crate) fn to_private_key(&self) -> Result<rsa::RsaPrivateKey, SigningKeyError> {
        let n = component("n", Some(&self.n))?;
        let e = component("e", Some(&self.e))?;
        let d = component("d", self.d.as_ref())?;
        let p = component("p", self.p.as_ref())?;
        let q = component("q", self.q.as_ref())?;

        let key = rsa::RsaPrivateKey::from_components(n, e, d, vec![p, q])
            .map_err(|e| SigningKeyError::InvalidKey(e.to_string()))?;
        key.validate()
            .map_err(|e| SigningKeyError::InvalidKey(e.to_string()))?;
        Ok(key)
    }
}

fn component(name: &'static str, value: Option<&String>) -> Result<BigUint, SigningKeyError> {
    let value = value.ok_or(SigningKeyError::MissingComponent(name))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim().trim_end_matches('='))
        .map_err(|e| SigningKeyError::InvalidComponent {
            component: name,
            reason: e.to_string(),
        })?;
    if bytes.is_empty() {
        return Err(SigningKeyError::MissingComponent(name));
    }
    Ok(BigUint::from_bytes_be(&bytes))
}
