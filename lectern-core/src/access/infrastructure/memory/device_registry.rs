use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::access::domain::aggregates::DeviceRecord;
use crate::access::domain::repositories::{DeviceRegistry, RegistryAdmission};
use crate::access::domain::value_objects::{DeviceFingerprint, DeviceMetadata};
use crate::clock::{Clock, SystemClock};

/// Device records held in a sharded map keyed by account.
///
/// `admit_and_record` holds the account's shard entry for the whole
/// count-then-insert, which serialises admissions per account while leaving
/// other accounts untouched.
pub struct InMemoryDeviceRegistry {
    accounts: DashMap<Uuid, Vec<DeviceRecord>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for InMemoryDeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDeviceRegistry")
            .field("accounts", &self.accounts.len())
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryDeviceRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryDeviceRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: DashMap::new(),
            clock,
        }
    }

    fn active_in(records: &[DeviceRecord]) -> u64 {
        records.iter().filter(|r| r.is_active()).count() as u64
    }

    fn position(records: &[DeviceRecord], device_id: &DeviceFingerprint) -> Option<usize> {
        records.iter().position(|r| r.device_id() == device_id)
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn count_active(&self, account_id: Uuid) -> Result<u64> {
        Ok(self
            .accounts
            .get(&account_id)
            .map(|records| Self::active_in(&records))
            .unwrap_or(0))
    }

    async fn find(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
    ) -> Result<Option<DeviceRecord>> {
        Ok(self.accounts.get(&account_id).and_then(|records| {
            records
                .iter()
                .find(|r| r.device_id() == device_id)
                .cloned()
        }))
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<DeviceRecord>> {
        let mut records = self
            .accounts
            .get(&account_id)
            .map(|records| records.value().clone())
            .unwrap_or_default();
        records.sort_by(|a, b| b.last_seen().cmp(&a.last_seen()));
        Ok(records)
    }

    async fn upsert_login(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
    ) -> Result<DeviceRecord> {
        let now = self.clock.utc_now();
        let mut records = self.accounts.entry(account_id).or_default();

        if let Some(idx) = Self::position(&records, device_id) {
            let record = &mut records[idx];
            record.refresh_login(metadata, now);
            return Ok(record.clone());
        }

        let record = DeviceRecord::register(account_id, device_id.clone(), metadata, now);
        records.push(record.clone());
        Ok(record)
    }

    async fn mark_logged_out(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
    ) -> Result<Option<DeviceRecord>> {
        let now = self.clock.utc_now();
        let Some(mut records) = self.accounts.get_mut(&account_id) else {
            return Ok(None);
        };

        Ok(records
            .iter_mut()
            .find(|r| r.device_id() == device_id)
            .map(|record| {
                record.log_out(now);
                record.clone()
            }))
    }

    async fn deactivate_all(&self, account_id: Uuid) -> Result<u64> {
        let now = self.clock.utc_now();
        let Some(mut records) = self.accounts.get_mut(&account_id) else {
            return Ok(0);
        };

        let mut flipped = 0;
        for record in records.iter_mut().filter(|r| r.is_active()) {
            record.log_out(now);
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn remove(&self, account_id: Uuid, device_id: &DeviceFingerprint) -> Result<bool> {
        let Some(mut records) = self.accounts.get_mut(&account_id) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| r.device_id() != device_id);
        Ok(records.len() != before)
    }

    async fn admit_and_record(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
        max_active: u32,
    ) -> Result<RegistryAdmission> {
        let now = self.clock.utc_now();
        // Entry guard stays alive until return
        let mut records = self.accounts.entry(account_id).or_default();

        if let Some(idx) = Self::position(&records, device_id) {
            let record = &mut records[idx];
            record.refresh_login(metadata, now);
            return Ok(RegistryAdmission::Existing(record.clone()));
        }

        let active = Self::active_in(&records);
        if active >= u64::from(max_active) {
            return Ok(RegistryAdmission::Rejected { active });
        }

        let record = DeviceRecord::register(account_id, device_id.clone(), metadata, now);
        records.push(record.clone());
        Ok(RegistryAdmission::Created(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::Utc;

    fn fp(id: &str) -> DeviceFingerprint {
        DeviceFingerprint::resolve(Some(id), None, None)
    }

    #[tokio::test]
    async fn reactivation_reuses_the_record() {
        let clock = FixedClock::new(Utc::now());
        let registry = InMemoryDeviceRegistry::new(Arc::new(clock.clone()));
        let account = Uuid::now_v7();
        let meta = DeviceMetadata::new(Some("Desk"), Some("UA"), Some("10.0.0.1"));

        let first = registry.upsert_login(account, &fp("d1"), &meta).await.unwrap();
        registry.mark_logged_out(account, &fp("d1")).await.unwrap();
        let again = registry
            .upsert_login(account, &fp("d1"), &DeviceMetadata::default())
            .await
            .unwrap();

        assert_eq!(first.id(), again.id());
        assert!(again.last_seen() > first.last_seen());
        assert_eq!(again.device_name(), Some("Desk"));
        assert_eq!(registry.list(account).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admit_and_record_enforces_cap_for_new_devices_only() {
        let registry = InMemoryDeviceRegistry::default();
        let account = Uuid::now_v7();
        let meta = DeviceMetadata::default();

        assert!(matches!(
            registry.admit_and_record(account, &fp("a"), &meta, 1).await.unwrap(),
            RegistryAdmission::Created(_)
        ));
        assert_eq!(
            registry.admit_and_record(account, &fp("b"), &meta, 1).await.unwrap(),
            RegistryAdmission::Rejected { active: 1 }
        );
        assert!(matches!(
            registry.admit_and_record(account, &fp("a"), &meta, 1).await.unwrap(),
            RegistryAdmission::Existing(_)
        ));
    }

    #[tokio::test]
    async fn deactivate_all_and_remove() {
        let registry = InMemoryDeviceRegistry::default();
        let account = Uuid::now_v7();
        let meta = DeviceMetadata::default();
        for id in ["a", "b", "c"] {
            registry.upsert_login(account, &fp(id), &meta).await.unwrap();
        }
        registry.mark_logged_out(account, &fp("c")).await.unwrap();

        assert_eq!(registry.deactivate_all(account).await.unwrap(), 2);
        assert_eq!(registry.count_active(account).await.unwrap(), 0);

        assert!(registry.remove(account, &fp("a")).await.unwrap());
        assert!(!registry.remove(account, &fp("a")).await.unwrap());
        assert_eq!(registry.list(account).await.unwrap().len(), 2);
    }
}
