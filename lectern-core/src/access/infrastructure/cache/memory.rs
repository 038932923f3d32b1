use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

use crate::access::domain::repositories::DeviceCache;

#[derive(Debug, Clone, Copy)]
struct CachedCount {
    active: u64,
    expires_at: Instant,
}

/// Process-local count cache with a fixed time-to-live.
#[derive(Debug)]
pub struct InMemoryDeviceCache {
    entries: DashMap<Uuid, CachedCount>,
    ttl: Duration,
}

impl InMemoryDeviceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

#[async_trait]
impl DeviceCache for InMemoryDeviceCache {
    async fn get(&self, account_id: Uuid) -> Result<Option<u64>> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(&account_id)
            .map(|entry| *entry.value())
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.active);
        if hit.is_none() {
            self.entries.remove_if(&account_id, |_, entry| entry.expires_at <= now);
        }
        Ok(hit)
    }

    async fn set(&self, account_id: Uuid, active: u64) -> Result<()> {
        self.entries.insert(
            account_id,
            CachedCount {
                active,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, account_id: Uuid) -> Result<()> {
        self.entries.remove(&account_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = InMemoryDeviceCache::new(Duration::from_secs(30));
        let account = Uuid::now_v7();

        cache.set(account, 3).await.unwrap();
        assert_eq!(cache.get(account).await.unwrap(), Some(3));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(account).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalidate_drops_the_entry() {
        let cache = InMemoryDeviceCache::new(Duration::from_secs(30));
        let account = Uuid::now_v7();

        cache.set(account, 1).await.unwrap();
        cache.invalidate(account).await.unwrap();
        assert_eq!(cache.get(account).await.unwrap(), None);
    }
}
