use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::domain::value_objects::{DeviceFingerprint, DeviceMetadata};

/// Where a device sits in the admission lifecycle for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// No record exists for the (account, device) pair
    Unknown,
    /// Signed in and occupying a slot
    Active,
    /// Signed out; the record is kept for audit and re-admitted freely
    Inactive,
}

impl DeviceState {
    pub fn of(record: Option<&DeviceRecord>) -> Self {
        match record {
            None => Self::Unknown,
            Some(record) if record.is_active() => Self::Active,
            Some(_) => Self::Inactive,
        }
    }
}

/// A device that has signed in to an account at least once.
///
/// Records are never deleted on logout. `last_seen` strictly increases on
/// every touch, even when two touches land on the same clock reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    id: Uuid,
    account_id: Uuid,
    device_id: DeviceFingerprint,
    device_name: Option<String>,
    user_agent: Option<String>,
    ip_address: Option<String>,
    is_active: bool,
    last_seen: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// First login from a device: the record starts out active.
    pub fn register(
        account_id: Uuid,
        device_id: DeviceFingerprint,
        metadata: &DeviceMetadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            device_id,
            device_name: metadata.device_name().map(str::to_owned),
            user_agent: metadata.user_agent().map(str::to_owned),
            ip_address: metadata.ip_address().map(str::to_owned),
            is_active: true,
            last_seen: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a record from storage.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn hydrate(
        id: Uuid,
        account_id: Uuid,
        device_id: DeviceFingerprint,
        device_name: Option<String>,
        user_agent: Option<String>,
        ip_address: Option<String>,
        is_active: bool,
        last_seen: DateTime<Utc>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            device_id,
            device_name,
            user_agent,
            ip_address,
            is_active,
            last_seen,
            created_at,
            updated_at,
        }
    }

    /// Repeat login: refresh network details and reactivate.
    ///
    /// A missing name keeps the stored one; user agent and address always
    /// reflect the latest login.
    pub fn refresh_login(&mut self, metadata: &DeviceMetadata, now: DateTime<Utc>) {
        if let Some(name) = metadata.device_name() {
            self.device_name = Some(name.to_owned());
        }
        self.user_agent = metadata.user_agent().map(str::to_owned);
        self.ip_address = metadata.ip_address().map(str::to_owned);
        self.is_active = true;
        self.touch(now);
    }

    pub fn log_out(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = if now > self.last_seen {
            now
        } else {
            self.last_seen + Duration::microseconds(1)
        };
        self.updated_at = now.max(self.updated_at);
    }

    pub fn state(&self) -> DeviceState {
        DeviceState::of(Some(self))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
    pub fn account_id(&self) -> Uuid {
        self.account_id
    }
    pub fn device_id(&self) -> &DeviceFingerprint {
        &self.device_id
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
    pub fn is_active(&self) -> bool {
        self.is_active
    }
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
