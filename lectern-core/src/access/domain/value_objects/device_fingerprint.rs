use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::clip;

/// Storage limit for device identifiers.
pub const DEVICE_ID_MAX_BYTES: usize = 190;

const UNKNOWN_USER_AGENT: &str = "unknown";

/// Stable identifier used to recognise a returning client.
///
/// Client-supplied ids are authoritative. Without one, the id is a SHA-256
/// digest of `user_agent|ip`, which is deliberately coarse: clients sharing a
/// user agent behind the same NAT collapse onto one id. That only affects the
/// device cap, never authorization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    pub fn resolve(
        provided_id: Option<&str>,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Self {
        if let Some(provided) = provided_id.map(str::trim).filter(|id| !id.is_empty()) {
            return Self(clip(provided, DEVICE_ID_MAX_BYTES).to_string());
        }

        let user_agent = user_agent.unwrap_or(UNKNOWN_USER_AGENT).trim();
        let ip_address = ip_address.unwrap_or_default().trim();

        let mut hasher = Sha256::new();
        hasher.update(user_agent.as_bytes());
        hasher.update(b"|");
        hasher.update(ip_address.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Self(clip(&digest, DEVICE_ID_MAX_BYTES).to_string())
    }

    /// Rehydrate an id read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.len() <= DEVICE_ID_MAX_BYTES {
            Self(value)
        } else {
            Self(clip(&value, DEVICE_ID_MAX_BYTES).to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256_hex(input: &str) -> String {
        hex::encode(Sha256::digest(input.as_bytes()))
    }

    #[test]
    fn provided_id_wins_and_is_trimmed() {
        let id = DeviceFingerprint::resolve(Some("  tablet-01 "), Some("UA"), Some("1.1.1.1"));
        assert_eq!(id.as_str(), "tablet-01");
    }

    #[test]
    fn provided_id_is_clipped_to_storage_limit() {
        let long = "x".repeat(400);
        let id = DeviceFingerprint::resolve(Some(&long), None, None);
        assert_eq!(id.as_str().len(), DEVICE_ID_MAX_BYTES);
    }

    #[test]
    fn blank_provided_id_falls_back_to_hash() {
        let id = DeviceFingerprint::resolve(Some("   "), Some("UA-X"), Some("1.2.3.4"));
        assert_eq!(id.as_str(), sha256_hex("UA-X|1.2.3.4"));
    }

    #[test]
    fn missing_user_agent_hashes_as_unknown() {
        let id = DeviceFingerprint::resolve(None, None, Some("10.0.0.1"));
        assert_eq!(id.as_str(), sha256_hex("unknown|10.0.0.1"));

        let no_ip = DeviceFingerprint::resolve(None, None, None);
        assert_eq!(no_ip.as_str(), sha256_hex("unknown|"));
    }

    #[test]
    fn fallback_is_stable_across_calls() {
        let a = DeviceFingerprint::resolve(None, Some("Mozilla/5.0"), Some("192.168.1.5"));
        let b = DeviceFingerprint::resolve(None, Some(" Mozilla/5.0 "), Some("192.168.1.5 "));
        assert_eq!(a, b);
    }
}
