use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::access::domain::repositories::{MediaCatalog, VideoAsset};
use crate::access::domain::value_objects::Deadline;
use crate::clock::Clock;
use crate::error::{GateError, Result};
use crate::media::{MediaTokenClaims, MediaTokenSigner};

use super::enrollment_access_verifier::EnrollmentAccessVerifier;

/// A minted token and when it stops working. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAccessToken {
    pub token: String,
    pub video_id: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: i64,
}

/// Mints short-lived RS256 playback tokens for entitled users.
#[derive(Clone)]
pub struct SignedMediaTokenIssuer {
    verifier: EnrollmentAccessVerifier,
    signer: Arc<dyn MediaTokenSigner>,
    catalog: Arc<dyn MediaCatalog>,
    clock: Arc<dyn Clock>,
    default_ttl_hours: u32,
    max_ttl_hours: u32,
}

impl fmt::Debug for SignedMediaTokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedMediaTokenIssuer")
            .field("key_id", &self.signer.key_id())
            .field("default_ttl_hours", &self.default_ttl_hours)
            .field("max_ttl_hours", &self.max_ttl_hours)
            .finish_non_exhaustive()
    }
}

impl SignedMediaTokenIssuer {
    pub const DEFAULT_TTL_HOURS: u32 = 2;
    /// Requested lifetimes above this are clamped down to it.
    pub const DEFAULT_MAX_TTL_HOURS: u32 = 24;

    pub fn new(
        verifier: EnrollmentAccessVerifier,
        signer: Arc<dyn MediaTokenSigner>,
        catalog: Arc<dyn MediaCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            signer,
            catalog,
            clock,
            default_ttl_hours: Self::DEFAULT_TTL_HOURS,
            max_ttl_hours: Self::DEFAULT_MAX_TTL_HOURS,
        }
    }

    pub fn with_default_ttl_hours(mut self, hours: u32) -> Self {
        if hours > 0 {
            self.default_ttl_hours = hours;
        }
        self
    }

    pub fn with_max_ttl_hours(mut self, hours: u32) -> Self {
        if hours > 0 {
            self.max_ttl_hours = hours;
        }
        self
    }

    pub fn default_ttl_hours(&self) -> u32 {
        self.default_ttl_hours
    }

    pub fn max_ttl_hours(&self) -> u32 {
        self.max_ttl_hours
    }

    /// Token for one video asset of a course the user is enrolled in.
    ///
    /// Denied requests return before anything is signed.
    #[instrument(skip(self, deadline), fields(key_id = self.signer.key_id()))]
    pub async fn issue(
        &self,
        video_id: &str,
        user_id: Uuid,
        course_id: &str,
        ttl_hours: Option<u32>,
        deadline: Deadline,
    ) -> Result<MediaAccessToken> {
        self.require_access(user_id, course_id, deadline).await?;
        self.issue_entitled(video_id, user_id, course_id, ttl_hours, deadline)
            .await
    }

    /// Resolve a lesson's video through the catalog and sign it.
    ///
    /// Entitlement is checked before the catalog is consulted, so a user
    /// without access learns nothing about the course's lessons.
    #[instrument(skip(self, deadline))]
    pub async fn issue_for_lesson(
        &self,
        user_id: Uuid,
        course_id: &str,
        lesson_id: &str,
        ttl_hours: Option<u32>,
        deadline: Deadline,
    ) -> Result<MediaAccessToken> {
        self.require_access(user_id, course_id, deadline).await?;

        let assets = self.course_assets(course_id, deadline).await?;
        let asset = assets
            .into_iter()
            .find(|asset| asset.lesson_id == lesson_id)
            .ok_or_else(|| GateError::MediaNotFound(format!("lesson {lesson_id}")))?;

        if !asset.is_ready() {
            return Err(GateError::MediaNotReady {
                status: asset.status,
            });
        }

        self.issue_entitled(&asset.video_id, user_id, course_id, ttl_hours, deadline)
            .await
    }

    /// One token per ready video of the course, keyed by lesson id.
    ///
    /// Entitlement is checked once. Assets that fail to sign are skipped.
    #[instrument(skip(self, deadline))]
    pub async fn issue_for_course(
        &self,
        user_id: Uuid,
        course_id: &str,
        ttl_hours: Option<u32>,
        deadline: Deadline,
    ) -> Result<BTreeMap<String, MediaAccessToken>> {
        self.require_access(user_id, course_id, deadline).await?;

        let assets = self.course_assets(course_id, deadline).await?;
        let mut tokens = BTreeMap::new();
        for asset in assets.iter().filter(|asset| asset.is_ready()) {
            match self.mint(&asset.video_id, ttl_hours) {
                Ok(token) => {
                    tokens.insert(asset.lesson_id.clone(), token);
                }
                Err(err) => {
                    warn!(lesson_id = %asset.lesson_id, video_id = %asset.video_id, error = %err, "skipping video token");
                }
            }
        }

        info!(%user_id, course_id, issued = tokens.len(), total = assets.len(), "course media tokens issued");
        self.verifier.touch(user_id, course_id, deadline).await;
        Ok(tokens)
    }

    async fn issue_entitled(
        &self,
        video_id: &str,
        user_id: Uuid,
        course_id: &str,
        ttl_hours: Option<u32>,
        deadline: Deadline,
    ) -> Result<MediaAccessToken> {
        let token = self.mint(video_id, ttl_hours)?;
        info!(%user_id, course_id, video_id, expires_at = %token.expires_at, "media token issued");

        self.verifier.touch(user_id, course_id, deadline).await;
        Ok(token)
    }

    async fn require_access(&self, user_id: Uuid, course_id: &str, deadline: Deadline) -> Result<()> {
        if self.verifier.check(user_id, course_id, deadline).await? {
            Ok(())
        } else {
            info!(%user_id, course_id, "media token denied, no active enrollment");
            Err(GateError::AccessDenied)
        }
    }

    async fn course_assets(&self, course_id: &str, deadline: Deadline) -> Result<Vec<VideoAsset>> {
        deadline
            .run("course media lookup", self.catalog.course_assets(course_id))
            .await?
            .ok_or_else(|| GateError::MediaNotFound(format!("course {course_id}")))
    }

    fn effective_ttl_hours(&self, requested: Option<u32>) -> u32 {
        let hours = requested
            .filter(|h| *h > 0)
            .unwrap_or(self.default_ttl_hours);
        if hours > self.max_ttl_hours {
            debug!(requested = hours, max = self.max_ttl_hours, "clamping media token ttl");
            self.max_ttl_hours
        } else {
            hours
        }
    }

    fn mint(&self, video_id: &str, ttl_hours: Option<u32>) -> Result<MediaAccessToken> {
        let hours = self.effective_ttl_hours(ttl_hours);
        let expires_in_seconds = i64::from(hours) * 3600;
        let expires_at = self
            .clock
            .utc_now()
            .checked_add_signed(Duration::seconds(expires_in_seconds))
            .ok_or_else(|| {
                GateError::Configuration(format!("media token expiry out of range for {hours}h"))
            })?;

        let claims = MediaTokenClaims::new(video_id, self.signer.key_id(), expires_at);
        let token = self.signer.sign(&claims).map_err(|err| {
            error!(video_id, error = %err, "media token signing failed");
            GateError::from(err)
        })?;

        Ok(MediaAccessToken {
            token,
            video_id: video_id.to_string(),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires_at),
            expires_in_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::domain::aggregates::EnrollmentGrant;
    use crate::access::domain::repositories::{MockEnrollmentStore, MockMediaCatalog};
    use crate::clock::FixedClock;
    use crate::media::SigningKeyError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSigner {
        calls: AtomicUsize,
        fail_for: Option<String>,
    }

    impl MediaTokenSigner for CountingSigner {
        fn key_id(&self) -> &str {
            "test-key"
        }

        fn sign(&self, claims: &MediaTokenClaims) -> std::result::Result<String, SigningKeyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.as_deref() == Some(claims.sub.as_str()) {
                return Err(SigningKeyError::Signing("boom".into()));
            }
            Ok(format!("signed.{}.{}", claims.sub, claims.exp))
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(std::time::Duration::from_secs(5))
    }

    fn asset(lesson: &str, video: &str, status: &str) -> VideoAsset {
        VideoAsset {
            lesson_id: lesson.into(),
            video_id: video.into(),
            status: status.into(),
            thumbnail_url: None,
        }
    }

    fn issuer(
        store: MockEnrollmentStore,
        catalog: MockMediaCatalog,
        signer: Arc<CountingSigner>,
        clock: FixedClock,
    ) -> SignedMediaTokenIssuer {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        let verifier = EnrollmentAccessVerifier::new(Arc::new(store), clock.clone());
        SignedMediaTokenIssuer::new(verifier, signer, Arc::new(catalog), clock)
    }

    fn enrolled_store() -> MockEnrollmentStore {
        let mut store = MockEnrollmentStore::new();
        store
            .expect_find_grant()
            .returning(|user, course| Ok(Some(EnrollmentGrant::active(user, course))));
        store.expect_touch_last_accessed().returning(|_, _, _| Ok(()));
        store
    }

    #[tokio::test]
    async fn denied_request_never_signs() {
        let mut store = MockEnrollmentStore::new();
        store.expect_find_grant().returning(|_, _| Ok(None));
        store.expect_touch_last_accessed().never();
        let signer = Arc::new(CountingSigner::default());

        let issuer = issuer(store, MockMediaCatalog::new(), signer.clone(), FixedClock::new(Utc::now()));
        let err = issuer
            .issue("vid-1", Uuid::now_v7(), "course-1", None, deadline())
            .await
            .unwrap_err();

        assert_eq!(err, GateError::AccessDenied);
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expiry_uses_default_ttl() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let signer = Arc::new(CountingSigner::default());
        let issuer = issuer(enrolled_store(), MockMediaCatalog::new(), signer, FixedClock::new(now));

        let token = issuer
            .issue("vid-1", Uuid::now_v7(), "course-1", None, deadline())
            .await
            .unwrap();

        assert_eq!(token.expires_in_seconds, 7200);
        assert_eq!(token.expires_at.timestamp(), 1_700_000_000 + 7200);
        assert_eq!(token.token, "signed.vid-1.1700007200");
    }

    #[tokio::test]
    async fn touch_failure_does_not_fail_issuance() {
        let mut store = MockEnrollmentStore::new();
        store
            .expect_find_grant()
            .returning(|user, course| Ok(Some(EnrollmentGrant::active(user, course))));
        store
            .expect_touch_last_accessed()
            .returning(|_, _, _| Err(anyhow::anyhow!("replica lag")));

        let issuer = issuer(
            store,
            MockMediaCatalog::new(),
            Arc::new(CountingSigner::default()),
            FixedClock::new(Utc::now()),
        );
        assert!(
            issuer
                .issue("vid-1", Uuid::now_v7(), "course-1", Some(1), deadline())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn course_tokens_cover_only_ready_assets() {
        let mut catalog = MockMediaCatalog::new();
        catalog.expect_course_assets().returning(|_| {
            Ok(Some(vec![
                asset("l1", "v1", "READY"),
                asset("l2", "v2", "inprogress"),
                asset("l3", "v3", "ready"),
                asset("l4", "v4", "READY"),
            ]))
        });
        let signer = Arc::new(CountingSigner {
            fail_for: Some("v4".into()),
            ..Default::default()
        });

        let issuer = issuer(enrolled_store(), catalog, signer, FixedClock::new(Utc::now()));
        let tokens = issuer
            .issue_for_course(Uuid::now_v7(), "course-1", None, deadline())
            .await
            .unwrap();

        assert_eq!(tokens.keys().collect::<Vec<_>>(), vec!["l1", "l3"]);
    }

    #[tokio::test]
    async fn lesson_lookup_reports_missing_and_unready_media() {
        let mut catalog = MockMediaCatalog::new();
        catalog
            .expect_course_assets()
            .returning(|_| Ok(Some(vec![asset("l1", "v1", "pendingupload")])));

        let issuer = issuer(
            enrolled_store(),
            catalog,
            Arc::new(CountingSigner::default()),
            FixedClock::new(Utc::now()),
        );
        let user = Uuid::now_v7();

        let missing = issuer
            .issue_for_lesson(user, "course-1", "l9", None, deadline())
            .await
            .unwrap_err();
        assert!(matches!(missing, GateError::MediaNotFound(_)));

        let unready = issuer
            .issue_for_lesson(user, "course-1", "l1", None, deadline())
            .await
            .unwrap_err();
        assert_eq!(
            unready,
            GateError::MediaNotReady {
                status: "pendingupload".into()
            }
        );
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let mut catalog = MockMediaCatalog::new();
        catalog.expect_course_assets().returning(|_| Ok(None));

        let issuer = issuer(
            enrolled_store(),
            catalog,
            Arc::new(CountingSigner::default()),
            FixedClock::new(Utc::now()),
        );
        let err = issuer
            .issue_for_course(Uuid::now_v7(), "missing", None, deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::MediaNotFound(_)));
    }

    #[tokio::test]
    async fn oversized_ttl_is_clamped_to_the_maximum() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let issuer = issuer(
            enrolled_store(),
            MockMediaCatalog::new(),
            Arc::new(CountingSigner::default()),
            FixedClock::new(now),
        )
        .with_max_ttl_hours(6);

        let token = issuer
            .issue("vid-1", Uuid::now_v7(), "course-1", Some(u32::MAX), deadline())
            .await
            .unwrap();

        assert_eq!(token.expires_in_seconds, 6 * 3600);
        assert_eq!(token.expires_at.timestamp(), 1_700_000_000 + 6 * 3600);
    }

    #[tokio::test]
    async fn expiry_past_the_calendar_is_an_error() {
        let issuer = issuer(
            enrolled_store(),
            MockMediaCatalog::new(),
            Arc::new(CountingSigner::default()),
            FixedClock::new(DateTime::<Utc>::MAX_UTC - Duration::hours(1)),
        )
        .with_max_ttl_hours(u32::MAX);

        let err = issuer
            .issue("vid-1", Uuid::now_v7(), "course-1", Some(u32::MAX), deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    #[tokio::test]
    async fn lesson_lookup_requires_enrollment_first() {
        let mut store = MockEnrollmentStore::new();
        store.expect_find_grant().returning(|_, _| Ok(None));
        let mut catalog = MockMediaCatalog::new();
        catalog.expect_course_assets().never();
        let signer = Arc::new(CountingSigner::default());

        let issuer = issuer(store, catalog, signer.clone(), FixedClock::new(Utc::now()));
        let err = issuer
            .issue_for_lesson(Uuid::now_v7(), "course-1", "l1", None, deadline())
            .await
            .unwrap_err();

        assert_eq!(err, GateError::AccessDenied);
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }
}
