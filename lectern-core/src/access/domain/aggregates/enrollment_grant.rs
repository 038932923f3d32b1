use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Enrollment lifecycle mirroring the purchase subsystem's status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Expired,
    Dropped,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Expired => "EXPIRED",
            Self::Dropped => "DROPPED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "COMPLETED" => Some(Self::Completed),
            "EXPIRED" => Some(Self::Expired),
            "DROPPED" => Some(Self::Dropped),
            _ => None,
        }
    }
}

/// Proof that a user may watch a course's media. Owned by the enrollment
/// subsystem; only read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentGrant {
    pub user_id: Uuid,
    pub course_id: String,
    pub status: EnrollmentStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl EnrollmentGrant {
    pub fn active(user_id: Uuid, course_id: impl Into<String>) -> Self {
        Self {
            user_id,
            course_id: course_id.into(),
            status: EnrollmentStatus::Active,
            expires_at: None,
            last_accessed_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_status(mut self, status: EnrollmentStatus) -> Self {
        self.status = status;
        self
    }

    /// Only ACTIVE grants that have not yet expired open the media.
    pub fn grants_access_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != EnrollmentStatus::Active {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}
