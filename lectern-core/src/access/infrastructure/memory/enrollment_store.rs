use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::access::domain::aggregates::EnrollmentGrant;
use crate::access::domain::repositories::EnrollmentStore;

#[derive(Debug, Default)]
pub struct InMemoryEnrollmentStore {
    grants: DashMap<(Uuid, String), EnrollmentGrant>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, grant: EnrollmentGrant) {
        self.grants
            .insert((grant.user_id, grant.course_id.clone()), grant);
    }

    pub fn get(&self, user_id: Uuid, course_id: &str) -> Option<EnrollmentGrant> {
        self.grants
            .get(&(user_id, course_id.to_string()))
            .map(|grant| grant.value().clone())
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn find_grant(&self, user_id: Uuid, course_id: &str) -> Result<Option<EnrollmentGrant>> {
        Ok(self.get(user_id, course_id))
    }

    async fn touch_last_accessed(
        &self,
        user_id: Uuid,
        course_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(mut grant) = self.grants.get_mut(&(user_id, course_id.to_string())) {
            grant.last_accessed_at = Some(at);
        }
        Ok(())
    }
}
