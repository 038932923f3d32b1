use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::access::domain::repositories::EnrollmentStore;
use crate::access::domain::value_objects::Deadline;
use crate::clock::Clock;
use crate::error::Result;

/// Answers "may this user watch this course right now?".
#[derive(Clone)]
pub struct EnrollmentAccessVerifier {
    store: Arc<dyn EnrollmentStore>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for EnrollmentAccessVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollmentAccessVerifier")
            .finish_non_exhaustive()
    }
}

impl EnrollmentAccessVerifier {
    pub fn new(store: Arc<dyn EnrollmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Access decision that surfaces lookup failures as
    /// [`GateError::UpstreamUnavailable`](crate::GateError::UpstreamUnavailable).
    pub async fn check(&self, user_id: Uuid, course_id: &str, deadline: Deadline) -> Result<bool> {
        let grant = deadline
            .run("enrollment lookup", self.store.find_grant(user_id, course_id))
            .await?;

        let now = self.clock.utc_now();
        let allowed = grant.as_ref().is_some_and(|g| g.grants_access_at(now));
        debug!(%user_id, course_id, allowed, status = ?grant.map(|g| g.status), "enrollment checked");
        Ok(allowed)
    }

    /// Boolean form. Any lookup failure denies.
    pub async fn has_access(&self, user_id: Uuid, course_id: &str, deadline: Deadline) -> bool {
        match self.check(user_id, course_id, deadline).await {
            Ok(allowed) => allowed,
            Err(err) => {
                error!(%user_id, course_id, error = %err, "enrollment check failed, denying access");
                false
            }
        }
    }

    /// Best-effort last-accessed update. Never fails the caller.
    pub async fn touch(&self, user_id: Uuid, course_id: &str, deadline: Deadline) {
        let now = self.clock.utc_now();
        if let Err(err) = deadline
            .run(
                "touch enrollment",
                self.store.touch_last_accessed(user_id, course_id, now),
            )
            .await
        {
            warn!(%user_id, course_id, error = %err, "failed to update enrollment last access");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::domain::aggregates::{EnrollmentGrant, EnrollmentStatus};
    use crate::access::domain::repositories::MockEnrollmentStore;
    use crate::clock::FixedClock;
    use crate::error::GateError;
    use chrono::{Duration, Utc};

    fn deadline() -> Deadline {
        Deadline::after(std::time::Duration::from_secs(5))
    }

    fn verifier(store: MockEnrollmentStore) -> EnrollmentAccessVerifier {
        EnrollmentAccessVerifier::new(Arc::new(store), Arc::new(FixedClock::new(Utc::now())))
    }

    #[tokio::test]
    async fn missing_grant_denies() {
        let mut store = MockEnrollmentStore::new();
        store.expect_find_grant().returning(|_, _| Ok(None));

        assert!(!verifier(store).has_access(Uuid::now_v7(), "c1", deadline()).await);
    }

    #[tokio::test]
    async fn completed_grant_denies() {
        let mut store = MockEnrollmentStore::new();
        store.expect_find_grant().returning(|user, course| {
            Ok(Some(
                EnrollmentGrant::active(user, course).with_status(EnrollmentStatus::Completed),
            ))
        });

        assert!(!verifier(store).has_access(Uuid::now_v7(), "c1", deadline()).await);
    }

    #[tokio::test]
    async fn grant_expired_yesterday_denies() {
        let mut store = MockEnrollmentStore::new();
        store.expect_find_grant().returning(|user, course| {
            Ok(Some(
                EnrollmentGrant::active(user, course).with_expiry(Utc::now() - Duration::days(1)),
            ))
        });

        assert!(!verifier(store).has_access(Uuid::now_v7(), "c1", deadline()).await);
    }

    #[tokio::test]
    async fn active_grant_allows() {
        let mut store = MockEnrollmentStore::new();
        store.expect_find_grant().returning(|user, course| {
            Ok(Some(
                EnrollmentGrant::active(user, course).with_expiry(Utc::now() + Duration::days(30)),
            ))
        });

        assert!(verifier(store).has_access(Uuid::now_v7(), "c1", deadline()).await);
    }

    #[tokio::test]
    async fn lookup_error_fails_closed() {
        let mut store = MockEnrollmentStore::new();
        store
            .expect_find_grant()
            .returning(|_, _| Err(anyhow::anyhow!("pool timed out")));
        let verifier = verifier(store);

        assert!(!verifier.has_access(Uuid::now_v7(), "c1", deadline()).await);
        assert!(matches!(
            verifier.check(Uuid::now_v7(), "c1", deadline()).await,
            Err(GateError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn touch_failure_is_swallowed() {
        let mut store = MockEnrollmentStore::new();
        store
            .expect_touch_last_accessed()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("read-only replica")));

        verifier(store).touch(Uuid::now_v7(), "c1", deadline()).await;
    }
}
