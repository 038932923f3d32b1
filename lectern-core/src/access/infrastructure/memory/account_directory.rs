use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::access::domain::aggregates::AccountStatus;
use crate::access::domain::repositories::AccountDirectory;

#[derive(Debug, Clone)]
struct AccountEntry {
    status: AccountStatus,
    suspension_reason: Option<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryAccountDirectory {
    accounts: DashMap<Uuid, AccountEntry>,
}

impl InMemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account in good standing.
    pub fn insert_active(&self, account_id: Uuid) {
        self.accounts.insert(
            account_id,
            AccountEntry {
                status: AccountStatus::Active,
                suspension_reason: None,
            },
        );
    }

    /// Administrative reinstatement.
    pub fn reinstate(&self, account_id: Uuid) {
        if let Some(mut entry) = self.accounts.get_mut(&account_id) {
            entry.status = AccountStatus::Active;
            entry.suspension_reason = None;
        }
    }

    pub fn suspension_reason(&self, account_id: Uuid) -> Option<String> {
        self.accounts
            .get(&account_id)
            .and_then(|entry| entry.suspension_reason.clone())
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn status(&self, account_id: Uuid) -> Result<Option<AccountStatus>> {
        Ok(self.accounts.get(&account_id).map(|entry| entry.status))
    }

    async fn suspend(&self, account_id: Uuid, reason: &str) -> Result<()> {
        let mut entry = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| anyhow::anyhow!("account {account_id} not found"))?;
        entry.status = AccountStatus::Suspended;
        entry.suspension_reason = Some(reason.to_string());
        Ok(())
    }
}
