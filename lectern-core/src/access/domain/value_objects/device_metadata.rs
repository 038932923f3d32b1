use serde::{Deserialize, Serialize};

use super::clip;

pub const DEVICE_NAME_MAX_BYTES: usize = 255;
pub const USER_AGENT_MAX_BYTES: usize = 512;
pub const IP_ADDRESS_MAX_BYTES: usize = 45;

/// Network and naming details captured on each login.
///
/// Oversized values are clipped to the column limits, and blank values are
/// treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    device_name: Option<String>,
    user_agent: Option<String>,
    ip_address: Option<String>,
}

impl DeviceMetadata {
    pub fn new(
        device_name: Option<&str>,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Self {
        Self {
            device_name: normalize(device_name, DEVICE_NAME_MAX_BYTES),
            user_agent: normalize(user_agent, USER_AGENT_MAX_BYTES),
            ip_address: normalize(ip_address, IP_ADDRESS_MAX_BYTES),
        }
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }
}

fn normalize(value: Option<&str>, max_bytes: usize) -> Option<String> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| clip(v, max_bytes).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_fields_are_clipped_not_rejected() {
        let name = "n".repeat(300);
        let ua = "u".repeat(1000);
        let ip = "1".repeat(60);
        let meta = DeviceMetadata::new(Some(&name), Some(&ua), Some(&ip));

        assert_eq!(meta.device_name().map(str::len), Some(DEVICE_NAME_MAX_BYTES));
        assert_eq!(meta.user_agent().map(str::len), Some(USER_AGENT_MAX_BYTES));
        assert_eq!(meta.ip_address().map(str::len), Some(IP_ADDRESS_MAX_BYTES));
    }

    #[test]
    fn empty_values_are_absent() {
        let meta = DeviceMetadata::new(Some(""), None, Some(""));
        assert_eq!(meta, DeviceMetadata::default());
    }
}
