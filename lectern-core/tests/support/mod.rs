#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lectern_core::FixedClock;
use lectern_core::access::Deadline;
use lectern_core::media::RsaMediaSigner;

pub const SIGNING_KEY_JWK: &str = include_str!("../fixtures/media_signing_key.json");
pub const SIGNING_KEY_PUBLIC_PEM: &str = include_str!("../fixtures/media_signing_key.pub.pem");
pub const SIGNING_KEY_ID: &str = "test-key";

pub fn signer() -> Arc<RsaMediaSigner> {
    Arc::new(RsaMediaSigner::from_jwk(Some(SIGNING_KEY_ID), SIGNING_KEY_JWK).expect("fixture key"))
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn clock() -> FixedClock {
    FixedClock::new(epoch())
}

pub fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(5))
}

/// Authenticator that treats the bearer string itself as the account id.
#[derive(Debug, Default)]
pub struct UuidBearer;

#[async_trait]
impl lectern_core::access::AuthenticationVerifier for UuidBearer {
    async fn authenticate(&self, bearer: &str) -> lectern_core::Result<uuid::Uuid> {
        bearer
            .parse()
            .map_err(|_| lectern_core::GateError::Unauthenticated)
    }
}
