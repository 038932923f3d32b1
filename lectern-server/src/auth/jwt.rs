use std::fmt;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use lectern_core::GateError;
use lectern_core::access::AuthenticationVerifier;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Claims carried by platform access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Verifies HS256 platform access tokens and yields the account id.
pub struct JwtBearerVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtBearerVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtBearerVerifier").finish_non_exhaustive()
    }
}

impl JwtBearerVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn decode(&self, token: &str) -> Result<AccessClaims, GateError> {
        decode::<AccessClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!(error = %err, "bearer token rejected");
                GateError::Unauthenticated
            })
    }
}

#[async_trait]
impl AuthenticationVerifier for JwtBearerVerifier {
    async fn authenticate(&self, bearer: &str) -> Result<Uuid, GateError> {
        self.decode(bearer).map(|claims| claims.sub)
    }
}
