use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::access::domain::aggregates::{EnrollmentGrant, EnrollmentStatus};
use crate::access::domain::repositories::EnrollmentStore;

#[derive(Debug, sqlx::FromRow)]
struct GrantRow {
    user_id: Uuid,
    course_id: String,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    last_accessed_at: Option<DateTime<Utc>>,
}

pub struct PostgresEnrollmentStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresEnrollmentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresEnrollmentStore").finish()
    }
}

impl PostgresEnrollmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentStore for PostgresEnrollmentStore {
    async fn find_grant(&self, user_id: Uuid, course_id: &str) -> Result<Option<EnrollmentGrant>> {
        let row: Option<GrantRow> = sqlx::query_as(
            r#"
            SELECT user_id, course_id, status, expires_at, last_accessed_at
            FROM enrollments
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load enrollment")?;

        row.map(|row| -> Result<EnrollmentGrant> {
            let status = EnrollmentStatus::parse(&row.status)
                .with_context(|| format!("Unknown enrollment status `{}`", row.status))?;
            Ok(EnrollmentGrant {
                user_id: row.user_id,
                course_id: row.course_id,
                status,
                expires_at: row.expires_at,
                last_accessed_at: row.last_accessed_at,
            })
        })
        .transpose()
    }

    async fn touch_last_accessed(
        &self,
        user_id: Uuid,
        course_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE enrollments SET last_accessed_at = $3 WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("Failed to update enrollment last access")?;

        Ok(())
    }
}
