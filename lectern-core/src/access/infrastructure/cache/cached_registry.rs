use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::access::domain::aggregates::DeviceRecord;
use crate::access::domain::repositories::{DeviceCache, DeviceRegistry, RegistryAdmission};
use crate::access::domain::value_objects::{DeviceFingerprint, DeviceMetadata};

/// Cache-aside decorator for active device counts.
///
/// Only `approx_active_count` reads the cache. `count_active` and
/// `admit_and_record` feed the cap decision and always go to the registry.
/// Every mutation invalidates the account's entry. Cache errors are logged
/// and the call falls through to the registry.
pub struct CachedDeviceRegistry<R> {
    inner: R,
    cache: Arc<dyn DeviceCache>,
}

impl<R: fmt::Debug> fmt::Debug for CachedDeviceRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedDeviceRegistry")
            .field("inner", &self.inner)
            .field("cache", &"Arc<dyn DeviceCache>")
            .finish()
    }
}

impl<R> CachedDeviceRegistry<R>
where
    R: DeviceRegistry,
{
    pub fn new(inner: R, cache: Arc<dyn DeviceCache>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    async fn invalidate(&self, account_id: Uuid) {
        if let Err(err) = self.cache.invalidate(account_id).await {
            warn!(%account_id, error = %err, "device cache invalidate failed");
        }
    }
}

#[async_trait]
impl<R> DeviceRegistry for CachedDeviceRegistry<R>
where
    R: DeviceRegistry,
{
    async fn count_active(&self, account_id: Uuid) -> Result<u64> {
        self.inner.count_active(account_id).await
    }

    async fn approx_active_count(&self, account_id: Uuid) -> Result<u64> {
        match self.cache.get(account_id).await {
            Ok(Some(active)) => {
                debug!(%account_id, active, "device count cache hit");
                return Ok(active);
            }
            Ok(None) => debug!(%account_id, "device count cache miss"),
            Err(err) => warn!(%account_id, error = %err, "device cache read failed"),
        }

        let active = self.inner.count_active(account_id).await?;
        if let Err(err) = self.cache.set(account_id, active).await {
            warn!(%account_id, error = %err, "device cache write failed");
        }
        Ok(active)
    }

    async fn find(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
    ) -> Result<Option<DeviceRecord>> {
        self.inner.find(account_id, device_id).await
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<DeviceRecord>> {
        self.inner.list(account_id).await
    }

    async fn upsert_login(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
    ) -> Result<DeviceRecord> {
        let record = self
            .inner
            .upsert_login(account_id, device_id, metadata)
            .await?;
        self.invalidate(account_id).await;
        Ok(record)
    }

    async fn mark_logged_out(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
    ) -> Result<Option<DeviceRecord>> {
        let record = self.inner.mark_logged_out(account_id, device_id).await?;
        self.invalidate(account_id).await;
        Ok(record)
    }

    async fn deactivate_all(&self, account_id: Uuid) -> Result<u64> {
        let flipped = self.inner.deactivate_all(account_id).await?;
        self.invalidate(account_id).await;
        Ok(flipped)
    }

    async fn remove(&self, account_id: Uuid, device_id: &DeviceFingerprint) -> Result<bool> {
        let removed = self.inner.remove(account_id, device_id).await?;
        self.invalidate(account_id).await;
        Ok(removed)
    }

    async fn admit_and_record(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
        max_active: u32,
    ) -> Result<RegistryAdmission> {
        let admission = self
            .inner
            .admit_and_record(account_id, device_id, metadata, max_active)
            .await?;
        if !matches!(admission, RegistryAdmission::Rejected { .. }) {
            self.invalidate(account_id).await;
        }
        Ok(admission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::domain::repositories::MockDeviceCache;
    use crate::access::infrastructure::memory::InMemoryDeviceRegistry;

    fn failing_cache() -> MockDeviceCache {
        let mut cache = MockDeviceCache::new();
        cache
            .expect_get()
            .returning(|_| Err(anyhow::anyhow!("redis down")));
        cache
            .expect_set()
            .returning(|_, _| Err(anyhow::anyhow!("redis down")));
        cache
            .expect_invalidate()
            .returning(|_| Err(anyhow::anyhow!("redis down")));
        cache
    }

    #[tokio::test]
    async fn keeps_serving_when_cache_fails() {
        let registry =
            CachedDeviceRegistry::new(InMemoryDeviceRegistry::default(), Arc::new(failing_cache()));
        let account = Uuid::now_v7();
        let device = DeviceFingerprint::resolve(Some("a"), None, None);

        registry
            .upsert_login(account, &device, &DeviceMetadata::default())
            .await
            .unwrap();
        assert_eq!(registry.approx_active_count(account).await.unwrap(), 1);
        assert!(registry.mark_logged_out(account, &device).await.unwrap().is_some());
        assert_eq!(registry.approx_active_count(account).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cache_hit_skips_the_registry() {
        let mut cache = MockDeviceCache::new();
        cache.expect_get().returning(|_| Ok(Some(4)));
        cache.expect_set().never();

        let registry =
            CachedDeviceRegistry::new(InMemoryDeviceRegistry::default(), Arc::new(cache));
        assert_eq!(registry.approx_active_count(Uuid::now_v7()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn stale_cached_count_never_reaches_the_cap_check() {
        let account = Uuid::now_v7();
        let mut cache = MockDeviceCache::new();
        cache.expect_get().returning(|_| Ok(Some(0)));
        cache.expect_set().returning(|_, _| Ok(()));
        cache.expect_invalidate().returning(|_| Ok(()));

        let inner = InMemoryDeviceRegistry::default();
        inner
            .upsert_login(
                account,
                &DeviceFingerprint::resolve(Some("laptop"), None, None),
                &DeviceMetadata::default(),
            )
            .await
            .unwrap();
        let registry = CachedDeviceRegistry::new(inner, Arc::new(cache));

        assert_eq!(registry.approx_active_count(account).await.unwrap(), 0);
        assert_eq!(registry.count_active(account).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn admission_reads_the_authoritative_store() {
        let mut cache = MockDeviceCache::new();
        cache.expect_get().never();
        cache.expect_invalidate().times(1).returning(|_| Ok(()));

        let registry =
            CachedDeviceRegistry::new(InMemoryDeviceRegistry::default(), Arc::new(cache));
        let admission = registry
            .admit_and_record(
                Uuid::now_v7(),
                &DeviceFingerprint::resolve(Some("a"), None, None),
                &DeviceMetadata::default(),
                5,
            )
            .await
            .unwrap();
        assert!(matches!(admission, RegistryAdmission::Created(_)));
    }
}
