use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

use crate::access::domain::aggregates::DeviceRecord;
use crate::access::domain::repositories::{DeviceRegistry, RegistryAdmission};
use crate::access::domain::value_objects::{DeviceFingerprint, DeviceMetadata};
use crate::clock::{Clock, SystemClock};

const DEVICE_COLUMNS: &str = "id, account_id, device_id, device_name, user_agent, ip_address, \
     is_active, last_seen, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct DeviceRow {
    id: Uuid,
    account_id: Uuid,
    device_id: String,
    device_name: Option<String>,
    user_agent: Option<String>,
    ip_address: Option<String>,
    is_active: bool,
    last_seen: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DeviceRow> for DeviceRecord {
    fn from(row: DeviceRow) -> Self {
        DeviceRecord::hydrate(
            row.id,
            row.account_id,
            DeviceFingerprint::from_stored(row.device_id),
            row.device_name,
            row.user_agent,
            row.ip_address,
            row.is_active,
            row.last_seen,
            row.created_at,
            row.updated_at,
        )
    }
}

/// Device registry over the `account_devices` table.
///
/// `last_seen` is advanced with `GREATEST(now, last_seen + 1µs)` so it stays
/// strictly increasing even when the application clock repeats or lags the
/// stored value.
pub struct PostgresDeviceRegistry {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for PostgresDeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDeviceRegistry")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresDeviceRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Advisory lock key for an account. Collisions only serialise unrelated
    /// accounts; they never merge their counts.
    fn lock_key(account_id: Uuid) -> i64 {
        let (high, low) = account_id.as_u64_pair();
        (high ^ low) as i64
    }

    async fn upsert_with<'e, E>(
        executor: E,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
        now: DateTime<Utc>,
    ) -> Result<DeviceRecord>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            INSERT INTO account_devices (
                id, account_id, device_id, device_name, user_agent, ip_address,
                is_active, last_seen, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7, $7)
            ON CONFLICT (account_id, device_id) DO UPDATE SET
                device_name = COALESCE(EXCLUDED.device_name, account_devices.device_name),
                user_agent = EXCLUDED.user_agent,
                ip_address = EXCLUDED.ip_address,
                is_active = TRUE,
                last_seen = GREATEST(EXCLUDED.last_seen, account_devices.last_seen + INTERVAL '1 microsecond'),
                updated_at = GREATEST(EXCLUDED.updated_at, account_devices.updated_at)
            RETURNING {DEVICE_COLUMNS}
            "#
        );

        let row: DeviceRow = sqlx::query_as(&sql)
            .bind(Uuid::now_v7())
            .bind(account_id)
            .bind(device_id.as_str())
            .bind(metadata.device_name())
            .bind(metadata.user_agent())
            .bind(metadata.ip_address())
            .bind(now)
            .fetch_one(executor)
            .await
            .context("Failed to upsert device login")?;

        Ok(row.into())
    }
}

#[async_trait]
impl DeviceRegistry for PostgresDeviceRegistry {
    async fn count_active(&self, account_id: Uuid) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM account_devices WHERE account_id = $1 AND is_active",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count active devices")?;

        Ok(count.max(0) as u64)
    }

    async fn find(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
    ) -> Result<Option<DeviceRecord>> {
        let sql = format!(
            "SELECT {DEVICE_COLUMNS} FROM account_devices WHERE account_id = $1 AND device_id = $2"
        );
        let row: Option<DeviceRow> = sqlx::query_as(&sql)
            .bind(account_id)
            .bind(device_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load device")?;

        Ok(row.map(Into::into))
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<DeviceRecord>> {
        let sql = format!(
            "SELECT {DEVICE_COLUMNS} FROM account_devices WHERE account_id = $1 ORDER BY last_seen DESC"
        );
        let rows: Vec<DeviceRow> = sqlx::query_as(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list devices")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert_login(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
    ) -> Result<DeviceRecord> {
        Self::upsert_with(
            &self.pool,
            account_id,
            device_id,
            metadata,
            self.clock.utc_now(),
        )
        .await
    }

    async fn mark_logged_out(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
    ) -> Result<Option<DeviceRecord>> {
        let sql = format!(
            r#"
            UPDATE account_devices
            SET is_active = FALSE,
                last_seen = GREATEST($3, last_seen + INTERVAL '1 microsecond'),
                updated_at = GREATEST($3, updated_at)
            WHERE account_id = $1 AND device_id = $2
            RETURNING {DEVICE_COLUMNS}
            "#
        );
        let row: Option<DeviceRow> = sqlx::query_as(&sql)
            .bind(account_id)
            .bind(device_id.as_str())
            .bind(self.clock.utc_now())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to mark device logged out")?;

        Ok(row.map(Into::into))
    }

    async fn deactivate_all(&self, account_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE account_devices
            SET is_active = FALSE,
                last_seen = GREATEST($2, last_seen + INTERVAL '1 microsecond'),
                updated_at = GREATEST($2, updated_at)
            WHERE account_id = $1 AND is_active
            "#,
        )
        .bind(account_id)
        .bind(self.clock.utc_now())
        .execute(&self.pool)
        .await
        .context("Failed to deactivate devices")?;

        Ok(result.rows_affected())
    }

    async fn remove(&self, account_id: Uuid, device_id: &DeviceFingerprint) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM account_devices WHERE account_id = $1 AND device_id = $2")
                .bind(account_id)
                .bind(device_id.as_str())
                .execute(&self.pool)
                .await
                .context("Failed to remove device")?;

        Ok(result.rows_affected() > 0)
    }

    async fn admit_and_record(
        &self,
        account_id: Uuid,
        device_id: &DeviceFingerprint,
        metadata: &DeviceMetadata,
        max_active: u32,
    ) -> Result<RegistryAdmission> {
        let now = self.clock.utc_now();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin admission transaction")?;

        // Serialises admissions for this account until commit/rollback
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(Self::lock_key(account_id))
            .execute(&mut *tx)
            .await
            .context("Failed to take account admission lock")?;

        let known: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM account_devices WHERE account_id = $1 AND device_id = $2 FOR UPDATE",
        )
        .bind(account_id)
        .bind(device_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to look up device")?;

        if known.is_some() {
            let record = Self::upsert_with(&mut *tx, account_id, device_id, metadata, now).await?;
            tx.commit().await.context("Failed to commit admission")?;
            return Ok(RegistryAdmission::Existing(record));
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM account_devices WHERE account_id = $1 AND is_active",
        )
        .bind(account_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count active devices")?;
        let active = active.max(0) as u64;

        if active >= u64::from(max_active) {
            tx.rollback().await.context("Failed to roll back admission")?;
            return Ok(RegistryAdmission::Rejected { active });
        }

        let record = Self::upsert_with(&mut *tx, account_id, device_id, metadata, now).await?;
        tx.commit().await.context("Failed to commit admission")?;
        Ok(RegistryAdmission::Created(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::domain::aggregates::DeviceState;

    async fn seed_account(pool: &PgPool) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO accounts (id) VALUES ($1)")
            .bind(id)
            .execute(pool)
            .await
            .expect("seed account");
        id
    }

    fn fp(id: &str) -> DeviceFingerprint {
        DeviceFingerprint::resolve(Some(id), None, None)
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    #[ignore = "requires DATABASE_URL"]
    async fn upsert_reactivates_without_duplicates(pool: PgPool) {
        let account = seed_account(&pool).await;
        let registry = PostgresDeviceRegistry::new(pool.clone());
        let meta = DeviceMetadata::new(Some("Desk"), Some("UA"), Some("10.0.0.1"));

        let first = registry.upsert_login(account, &fp("d1"), &meta).await.unwrap();
        let out = registry
            .mark_logged_out(account, &fp("d1"))
            .await
            .unwrap()
            .expect("device exists");
        assert_eq!(out.state(), DeviceState::Inactive);

        let again = registry
            .upsert_login(account, &fp("d1"), &DeviceMetadata::default())
            .await
            .unwrap();
        assert_eq!(again.id(), first.id());
        assert!(again.last_seen() > out.last_seen());
        assert_eq!(again.device_name(), Some("Desk"));
        assert_eq!(registry.list(account).await.unwrap().len(), 1);
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_admissions_respect_the_cap(pool: PgPool) {
        let account = seed_account(&pool).await;
        let registry = Arc::new(PostgresDeviceRegistry::new(pool.clone()));

        let attempts = (0..8).map(|i| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry
                    .admit_and_record(
                        account,
                        &fp(&format!("device-{i}")),
                        &DeviceMetadata::default(),
                        3,
                    )
                    .await
            })
        });
        let results = futures::future::join_all(attempts).await;

        let created = results
            .into_iter()
            .map(|r| r.expect("task").expect("admission"))
            .filter(|a| matches!(a, RegistryAdmission::Created(_)))
            .count();
        assert_eq!(created, 3);
        assert_eq!(registry.count_active(account).await.unwrap(), 3);
    }
}
