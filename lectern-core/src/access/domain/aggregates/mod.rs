// Admission domain aggregates
// These are the entities that enforce business rules and own
// consistency boundaries for device sessions and entitlements.

mod device_record;
mod enrollment_grant;

pub use device_record::{DeviceRecord, DeviceState};
pub use enrollment_grant::{EnrollmentGrant, EnrollmentStatus};

use serde::{Deserialize, Serialize};

/// Suspension flag on the account aggregate.
///
/// Set by the login path when a device admission is rejected; cleared only by
/// an administrator outside this subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

impl Default for AccountStatus {
    fn default() -> Self {
        Self::Active
    }
}
