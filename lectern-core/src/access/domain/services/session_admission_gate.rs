use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::access::domain::aggregates::DeviceRecord;
use crate::access::domain::repositories::{DeviceRegistry, RegistryAdmission};
use crate::access::domain::value_objects::{Deadline, DeviceFingerprint, DeviceMetadata};
use crate::error::{GateError, Result};

/// Device cap applied to every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    max_active_devices: u32,
}

impl AdmissionPolicy {
    pub const DEFAULT_MAX_ACTIVE_DEVICES: u32 = 5;

    /// A cap of zero would lock every account out; it falls back to the
    /// default.
    pub fn new(max_active_devices: u32) -> Self {
        if max_active_devices == 0 {
            warn!(
                default = Self::DEFAULT_MAX_ACTIVE_DEVICES,
                "max active devices must be positive, using default"
            );
            return Self::default();
        }
        Self { max_active_devices }
    }

    /// Parse an operator-supplied setting. Missing, non-numeric and
    /// non-positive values fall back to the default.
    pub fn from_setting(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return Self::default();
        };
        match raw.parse::<i64>() {
            Ok(value) if value > 0 => Self::new(u32::try_from(value).unwrap_or(u32::MAX)),
            _ => {
                warn!(
                    value = raw,
                    default = Self::DEFAULT_MAX_ACTIVE_DEVICES,
                    "invalid max active devices setting, using default"
                );
                Self::default()
            }
        }
    }

    pub fn max_active_devices(&self) -> u32 {
        self.max_active_devices
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            max_active_devices: Self::DEFAULT_MAX_ACTIVE_DEVICES,
        }
    }
}

/// How the login path combines the cap check with recording the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionMode {
    /// Count and insert under one per-account critical section
    #[default]
    Atomic,
    /// Evaluate, then record. Concurrent first-time logins can over-admit by
    /// at most the number in flight.
    CheckThenRecord,
}

impl AdmissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::CheckThenRecord => "check-then-record",
        }
    }
}

impl fmt::Display for AdmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdmissionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "check-then-record" | "check_then_record" => Ok(Self::CheckThenRecord),
            other => Err(format!(
                "unknown admission mode `{other}`, expected `atomic` or `check-then-record`"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionReason {
    KnownDevice,
    SlotAvailable,
    DeviceLimitExceeded { limit: u32, active: u64 },
}

/// Result of evaluating one login attempt against the cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub allow: bool,
    pub reason: AdmissionReason,
    pub existing: Option<DeviceRecord>,
}

impl AdmissionDecision {
    fn known(record: DeviceRecord) -> Self {
        Self {
            allow: true,
            reason: AdmissionReason::KnownDevice,
            existing: Some(record),
        }
    }

    fn slot_available() -> Self {
        Self {
            allow: true,
            reason: AdmissionReason::SlotAvailable,
            existing: None,
        }
    }

    fn rejected(limit: u32, active: u64) -> Self {
        Self {
            allow: false,
            reason: AdmissionReason::DeviceLimitExceeded { limit, active },
            existing: None,
        }
    }
}

/// Decides whether an (account, device) pair may sign in.
///
/// Known devices are always admitted, active or not. A new device is
/// admitted only while the account is below the cap.
#[derive(Clone)]
pub struct SessionAdmissionGate {
    registry: Arc<dyn DeviceRegistry>,
    policy: AdmissionPolicy,
}

impl fmt::Debug for SessionAdmissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAdmissionGate")
            .field("registry", &"Arc<dyn DeviceRegistry>")
            .field("policy", &self.policy)
            .finish()
    }
}

impl SessionAdmissionGate {
    pub fn new(registry: Arc<dyn DeviceRegistry>, policy: AdmissionPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    pub async fn evaluate(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        deadline: Deadline,
    ) -> Result<AdmissionDecision> {
        if let Some(record) = deadline
            .run("device lookup", self.registry.find(account_id, device_id))
            .await?
        {
            debug!(%account_id, %device_id, "known device");
            return Ok(AdmissionDecision::known(record));
        }

        let active = deadline
            .run("active device count", self.registry.count_active(account_id))
            .await?;
        let limit = self.policy.max_active_devices;
        if active >= u64::from(limit) {
            info!(%account_id, active, limit, "device limit reached");
            return Ok(AdmissionDecision::rejected(limit, active));
        }

        Ok(AdmissionDecision::slot_available())
    }

    /// [`evaluate`](Self::evaluate), with a rejection turned into
    /// [`GateError::DeviceLimitExceeded`].
    pub async fn ensure_admissible(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        deadline: Deadline,
    ) -> Result<AdmissionDecision> {
        let decision = self.evaluate(account_id, device_id, deadline).await?;
        match decision.reason {
            AdmissionReason::DeviceLimitExceeded { limit, .. } => {
                Err(GateError::DeviceLimitExceeded { limit })
            }
            _ => Ok(decision),
        }
    }

    /// Second half of the two-step flow; call after credentials succeed.
    pub async fn record_login(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
        deadline: Deadline,
    ) -> Result<DeviceRecord> {
        deadline
            .run(
                "record device login",
                self.registry.upsert_login(account_id, device_id, metadata),
            )
            .await
    }

    /// Atomic admission: cap check and record in one registry call.
    pub async fn admit(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
        deadline: Deadline,
    ) -> Result<DeviceRecord> {
        let limit = self.policy.max_active_devices;
        let admission = deadline
            .run(
                "admit device",
                self.registry
                    .admit_and_record(account_id, device_id, metadata, limit),
            )
            .await?;

        match admission {
            RegistryAdmission::Existing(record) => {
                debug!(%account_id, %device_id, "known device re-admitted");
                Ok(record)
            }
            RegistryAdmission::Created(record) => {
                info!(%account_id, %device_id, "new device admitted");
                Ok(record)
            }
            RegistryAdmission::Rejected { active } => {
                info!(%account_id, active, limit, "device limit reached");
                Err(GateError::DeviceLimitExceeded { limit })
            }
        }
    }

    pub async fn log_out(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        deadline: Deadline,
    ) -> Result<DeviceRecord> {
        deadline
            .run(
                "device logout",
                self.registry.mark_logged_out(account_id, device_id),
            )
            .await?
            .ok_or(GateError::DeviceNotFound)
    }

    pub async fn log_out_everywhere(&self, account_id: Uuid, deadline: Deadline) -> Result<u64> {
        let flipped = deadline
            .run("logout all devices", self.registry.deactivate_all(account_id))
            .await?;
        info!(%account_id, flipped, "all devices logged out");
        Ok(flipped)
    }

    pub async fn devices(&self, account_id: Uuid, deadline: Deadline) -> Result<Vec<DeviceRecord>> {
        deadline
            .run("list devices", self.registry.list(account_id))
            .await
    }

    /// Active device count for display. May lag the registry while a count
    /// cache fronts it; admission decisions never use this.
    pub async fn active_device_count(&self, account_id: Uuid, deadline: Deadline) -> Result<u64> {
        deadline
            .run(
                "active device count",
                self.registry.approx_active_count(account_id),
            )
            .await
    }

    /// Hard delete of a device record. Frees the slot and erases its
    /// history, so only operator tooling should call this.
    pub async fn forget(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        deadline: Deadline,
    ) -> Result<()> {
        let removed = deadline
            .run("remove device", self.registry.remove(account_id, device_id))
            .await?;
        if removed {
            info!(%account_id, %device_id, "device removed");
            Ok(())
        } else {
            Err(GateError::DeviceNotFound)
        }
    }
}
