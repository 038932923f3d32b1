use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of a media access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTokenClaims {
    /// Video asset the token unlocks
    pub sub: String,
    /// Signing key id, repeated from the header
    pub kid: String,
    /// Expiry as epoch seconds
    pub exp: i64,
}

impl MediaTokenClaims {
    pub fn new(video_id: impl Into<String>, key_id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: video_id.into(),
            kid: key_id.into(),
            exp: expires_at.timestamp(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
