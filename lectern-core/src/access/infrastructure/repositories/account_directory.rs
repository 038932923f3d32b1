use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::access::domain::aggregates::AccountStatus;
use crate::access::domain::repositories::AccountDirectory;

pub struct PostgresAccountDirectory {
    pool: PgPool,
}

impl fmt::Debug for PostgresAccountDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresAccountDirectory").finish()
    }
}

impl PostgresAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PostgresAccountDirectory {
    async fn status(&self, account_id: Uuid) -> Result<Option<AccountStatus>> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load account status")?;

        Ok(status.map(|raw| {
            AccountStatus::parse(&raw).unwrap_or_else(|| {
                warn!(%account_id, status = %raw, "unrecognised account status, treating as suspended");
                AccountStatus::Suspended
            })
        }))
    }

    async fn suspend(&self, account_id: Uuid, reason: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET status = 'suspended',
                suspended_at = COALESCE(suspended_at, NOW()),
                suspension_reason = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .context("Failed to suspend account")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("account {account_id} not found");
        }
        Ok(())
    }
}
