use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::access::domain::repositories::{MediaCatalog, VideoAsset};

#[derive(Debug, sqlx::FromRow)]
struct VideoRow {
    lesson_id: String,
    video_id: String,
    status: String,
    thumbnail_url: Option<String>,
}

pub struct PostgresMediaCatalog {
    pool: PgPool,
}

impl fmt::Debug for PostgresMediaCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresMediaCatalog").finish()
    }
}

impl PostgresMediaCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaCatalog for PostgresMediaCatalog {
    async fn course_assets(&self, course_id: &str) -> Result<Option<Vec<VideoAsset>>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM courses WHERE id = $1)")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to look up course")?;
        if !exists {
            return Ok(None);
        }

        let rows: Vec<VideoRow> = sqlx::query_as(
            r#"
            SELECT lesson_id, video_id, status, thumbnail_url
            FROM course_videos
            WHERE course_id = $1
            ORDER BY position, lesson_id
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load course videos")?;

        Ok(Some(
            rows.into_iter()
                .map(|row| VideoAsset {
                    lesson_id: row.lesson_id,
                    video_id: row.video_id,
                    status: row.status,
                    thumbnail_url: row.thumbnail_url,
                })
                .collect(),
        ))
    }
}
