use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::access::domain::repositories::{MediaCatalog, VideoAsset};

#[derive(Debug, Default)]
pub struct InMemoryMediaCatalog {
    courses: DashMap<String, Vec<VideoAsset>>,
}

impl InMemoryMediaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_course(&self, course_id: impl Into<String>, assets: Vec<VideoAsset>) {
        self.courses.insert(course_id.into(), assets);
    }
}

#[async_trait]
impl MediaCatalog for InMemoryMediaCatalog {
    async fn course_assets(&self, course_id: &str) -> Result<Option<Vec<VideoAsset>>> {
        Ok(self.courses.get(course_id).map(|assets| assets.value().clone()))
    }
}
