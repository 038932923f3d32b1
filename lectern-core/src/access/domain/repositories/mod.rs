use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::domain::aggregates::{AccountStatus, DeviceRecord, EnrollmentGrant};
use crate::access::domain::value_objects::{DeviceFingerprint, DeviceMetadata};
use crate::error::GateError;

/// Outcome of the atomic insert-if-under-cap registry operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAdmission {
    /// The device was already known; it has been refreshed and reactivated
    Existing(DeviceRecord),
    /// A new record was created inside the cap
    Created(DeviceRecord),
    /// The account already holds `active` active devices
    Rejected { active: u64 },
}

impl RegistryAdmission {
    pub fn into_record(self) -> Option<DeviceRecord> {
        match self {
            Self::Existing(record) | Self::Created(record) => Some(record),
            Self::Rejected { .. } => None,
        }
    }
}

/// Durable store of per-account device records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Authoritative active count. The cap check reads only this.
    async fn count_active(&self, account_id: Uuid) -> Result<u64>;

    /// Active count for display. Caching decorators may serve a stale value,
    /// so admission must never read it.
    async fn approx_active_count(&self, account_id: Uuid) -> Result<u64> {
        self.count_active(account_id).await
    }

    async fn find(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
    ) -> Result<Option<DeviceRecord>>;

    /// All devices of an account, most recently seen first.
    async fn list(&self, account_id: Uuid) -> Result<Vec<DeviceRecord>>;

    /// Create the record, or refresh metadata and reactivate an existing one.
    async fn upsert_login(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
    ) -> Result<DeviceRecord>;

    async fn mark_logged_out(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
    ) -> Result<Option<DeviceRecord>>;

    /// Log out every active device of an account. Returns how many flipped.
    async fn deactivate_all(&self, account_id: Uuid) -> Result<u64>;

    /// Hard delete. Administrative only; logout never deletes.
    async fn remove(&self, account_id: Uuid, device_id: &DeviceFingerprint) -> Result<bool>;

    /// Count and insert under a single per-account critical section.
    ///
    /// Known devices are always admitted. Unknown devices are created only
    /// when fewer than `max_active` devices are active.
    async fn admit_and_record(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
        max_active: u32,
    ) -> Result<RegistryAdmission>;
}

/// Cache of active device counts keyed by account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceCache: Send + Sync {
    async fn get(&self, account_id: Uuid) -> Result<Option<u64>>;
    async fn set(&self, account_id: Uuid, active: u64) -> Result<()>;
    async fn invalidate(&self, account_id: Uuid) -> Result<()>;
}

/// Account aggregate as seen from the login path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// `None` when the account does not exist.
    async fn status(&self, account_id: Uuid) -> Result<Option<AccountStatus>>;

    async fn suspend(&self, account_id: Uuid, reason: &str) -> Result<()>;
}

/// Read side of the enrollment subsystem.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn find_grant(&self, user_id: Uuid, course_id: &str)
    -> Result<Option<EnrollmentGrant>>;

    async fn touch_last_accessed(
        &self,
        user_id: Uuid,
        course_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// A protected video attached to a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAsset {
    pub lesson_id: String,
    pub video_id: String,
    pub status: String,
    pub thumbnail_url: Option<String>,
}

impl VideoAsset {
    pub fn is_ready(&self) -> bool {
        self.status.eq_ignore_ascii_case("READY")
    }
}

/// Course content lookup. Owned by the course subsystem.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Video assets of a course in lesson order; `None` if the course is
    /// unknown.
    async fn course_assets(&self, course_id: &str) -> Result<Option<Vec<VideoAsset>>>;
}

/// Resolves a bearer credential to an account id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthenticationVerifier: Send + Sync {
    async fn authenticate(&self, bearer: &str) -> std::result::Result<Uuid, GateError>;
}
