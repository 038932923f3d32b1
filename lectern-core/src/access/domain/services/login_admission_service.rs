use std::fmt;
use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::access::domain::aggregates::{AccountStatus, DeviceRecord};
use crate::access::domain::repositories::{AccountDirectory, AuthenticationVerifier};
use crate::access::domain::value_objects::{Deadline, DeviceFingerprint, DeviceMetadata};
use crate::error::{GateError, Result};

use super::session_admission_gate::{AdmissionMode, SessionAdmissionGate};

/// Everything the login path knows about one sign-in attempt.
#[derive(Debug, Clone, Default)]
pub struct LoginAttempt {
    pub bearer: String,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl LoginAttempt {
    pub fn fingerprint(&self) -> DeviceFingerprint {
        DeviceFingerprint::resolve(
            self.device_id.as_deref(),
            self.user_agent.as_deref(),
            self.ip_address.as_deref(),
        )
    }

    pub fn metadata(&self) -> DeviceMetadata {
        DeviceMetadata::new(
            self.device_name.as_deref(),
            self.user_agent.as_deref(),
            self.ip_address.as_deref(),
        )
    }
}

/// Occupied device slots against the cap. `active` may briefly lag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceUsage {
    pub active: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Default)]
pub struct LogoutRequest {
    pub bearer: String,
    pub device_id: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    /// Sign out every device of the account instead of the calling one
    pub all_devices: bool,
}

impl LogoutRequest {
    pub fn fingerprint(&self) -> DeviceFingerprint {
        DeviceFingerprint::resolve(
            self.device_id.as_deref(),
            self.user_agent.as_deref(),
            self.ip_address.as_deref(),
        )
    }
}

/// Login orchestration: credentials, suspension, then device admission.
///
/// Credentials are checked before admission so a bad password never takes a
/// slot. A rejected admission suspends the account.
#[derive(Clone)]
pub struct LoginAdmissionService {
    authenticator: Arc<dyn AuthenticationVerifier>,
    accounts: Arc<dyn AccountDirectory>,
    gate: SessionAdmissionGate,
    mode: AdmissionMode,
}

impl fmt::Debug for LoginAdmissionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginAdmissionService")
            .field("gate", &self.gate)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl LoginAdmissionService {
    pub fn new(
        authenticator: Arc<dyn AuthenticationVerifier>,
        accounts: Arc<dyn AccountDirectory>,
        gate: SessionAdmissionGate,
        mode: AdmissionMode,
    ) -> Self {
        Self {
            authenticator,
            accounts,
            gate,
            mode,
        }
    }

    pub fn gate(&self) -> &SessionAdmissionGate {
        &self.gate
    }

    pub fn mode(&self) -> AdmissionMode {
        self.mode
    }

    #[instrument(skip(self, attempt, deadline), fields(mode = %self.mode))]
    pub async fn login(&self, attempt: &LoginAttempt, deadline: Deadline) -> Result<DeviceRecord> {
        let account_id = self.authenticated_account(&attempt.bearer, deadline).await?;

        let device_id = attempt.fingerprint();
        let metadata = attempt.metadata();

        let admitted = match self.mode {
            AdmissionMode::Atomic => {
                self.gate
                    .admit(account_id, &device_id, &metadata, deadline)
                    .await
            }
            AdmissionMode::CheckThenRecord => {
                match self
                    .gate
                    .ensure_admissible(account_id, &device_id, deadline)
                    .await
                {
                    Ok(_) => {
                        self.gate
                            .record_login(account_id, &device_id, &metadata, deadline)
                            .await
                    }
                    Err(err) => Err(err),
                }
            }
        };

        match admitted {
            Ok(record) => {
                info!(%account_id, device_id = %record.device_id(), "login admitted");
                Ok(record)
            }
            Err(GateError::DeviceLimitExceeded { limit }) => {
                self.suspend_for_device_limit(account_id, limit, deadline)
                    .await;
                Err(GateError::DeviceLimitExceeded { limit })
            }
            Err(err) => Err(err),
        }
    }

    /// Marks the calling device (or all devices) inactive.
    /// Returns the number of devices signed out.
    #[instrument(skip(self, request, deadline), fields(all = request.all_devices))]
    pub async fn logout(&self, request: &LogoutRequest, deadline: Deadline) -> Result<u64> {
        let account_id = self.authenticate(&request.bearer, deadline).await?;

        if request.all_devices {
            return self.gate.log_out_everywhere(account_id, deadline).await;
        }

        let record = self
            .gate
            .log_out(account_id, &request.fingerprint(), deadline)
            .await?;
        info!(%account_id, device_id = %record.device_id(), "device logged out");
        Ok(1)
    }

    pub async fn devices(&self, bearer: &str, deadline: Deadline) -> Result<Vec<DeviceRecord>> {
        let account_id = self.authenticate(bearer, deadline).await?;
        self.gate.devices(account_id, deadline).await
    }

    /// How many of the account's device slots are in use, for display.
    pub async fn device_usage(&self, bearer: &str, deadline: Deadline) -> Result<DeviceUsage> {
        let account_id = self.authenticate(bearer, deadline).await?;
        let active = self.gate.active_device_count(account_id, deadline).await?;
        Ok(DeviceUsage {
            active,
            limit: self.gate.policy().max_active_devices(),
        })
    }

    async fn authenticate(&self, bearer: &str, deadline: Deadline) -> Result<Uuid> {
        deadline
            .guard("authenticate", self.authenticator.authenticate(bearer))
            .await
    }

    /// Resolve the bearer and refuse missing or suspended accounts.
    async fn authenticated_account(&self, bearer: &str, deadline: Deadline) -> Result<Uuid> {
        let account_id = self.authenticate(bearer, deadline).await?;

        let status = deadline
            .run("account status", self.accounts.status(account_id))
            .await?;
        match status {
            Some(AccountStatus::Active) => Ok(account_id),
            Some(AccountStatus::Suspended) => {
                warn!(%account_id, "login refused for suspended account");
                Err(GateError::AccountSuspended)
            }
            None => {
                warn!(%account_id, "credential resolved to unknown account");
                Err(GateError::Unauthenticated)
            }
        }
    }

    async fn suspend_for_device_limit(&self, account_id: Uuid, limit: u32, deadline: Deadline) {
        let reason = format!("Exceeded the maximum of {limit} active devices");
        match deadline
            .run("suspend account", self.accounts.suspend(account_id, &reason))
            .await
        {
            Ok(()) => warn!(%account_id, limit, "account suspended for exceeding device limit"),
            Err(err) => {
                error!(%account_id, error = %err, "failed to suspend account after device limit")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::domain::repositories::{
        MockAccountDirectory, MockAuthenticationVerifier, MockDeviceRegistry, RegistryAdmission,
    };
    use crate::access::domain::services::AdmissionPolicy;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    fn attempt() -> LoginAttempt {
        LoginAttempt {
            bearer: "token".into(),
            device_id: Some("laptop".into()),
            ..Default::default()
        }
    }

    fn authenticator(account_id: Uuid) -> MockAuthenticationVerifier {
        let mut auth = MockAuthenticationVerifier::new();
        auth.expect_authenticate().returning(move |_| Ok(account_id));
        auth
    }

    #[tokio::test]
    async fn bad_credentials_never_touch_the_registry() {
        let mut auth = MockAuthenticationVerifier::new();
        auth.expect_authenticate()
            .returning(|_| Err(GateError::Unauthenticated));
        let mut accounts = MockAccountDirectory::new();
        accounts.expect_status().never();
        let mut registry = MockDeviceRegistry::new();
        registry.expect_admit_and_record().never();

        let service = LoginAdmissionService::new(
            Arc::new(auth),
            Arc::new(accounts),
            SessionAdmissionGate::new(Arc::new(registry), AdmissionPolicy::default()),
            AdmissionMode::Atomic,
        );

        let err = service.login(&attempt(), deadline()).await.unwrap_err();
        assert_eq!(err, GateError::Unauthenticated);
    }

    #[tokio::test]
    async fn suspended_account_is_refused_before_admission() {
        let account_id = Uuid::now_v7();
        let mut accounts = MockAccountDirectory::new();
        accounts
            .expect_status()
            .returning(|_| Ok(Some(AccountStatus::Suspended)));
        let mut registry = MockDeviceRegistry::new();
        registry.expect_admit_and_record().never();

        let service = LoginAdmissionService::new(
            Arc::new(authenticator(account_id)),
            Arc::new(accounts),
            SessionAdmissionGate::new(Arc::new(registry), AdmissionPolicy::default()),
            AdmissionMode::Atomic,
        );

        let err = service.login(&attempt(), deadline()).await.unwrap_err();
        assert_eq!(err, GateError::AccountSuspended);
    }

    #[tokio::test]
    async fn device_limit_suspends_the_account() {
        let account_id = Uuid::now_v7();
        let mut accounts = MockAccountDirectory::new();
        accounts
            .expect_status()
            .returning(|_| Ok(Some(AccountStatus::Active)));
        accounts
            .expect_suspend()
            .withf(move |id, reason| *id == account_id && reason.contains("2"))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_admit_and_record()
            .returning(|_, _, _, _| Ok(RegistryAdmission::Rejected { active: 2 }));

        let service = LoginAdmissionService::new(
            Arc::new(authenticator(account_id)),
            Arc::new(accounts),
            SessionAdmissionGate::new(Arc::new(registry), AdmissionPolicy::new(2)),
            AdmissionMode::Atomic,
        );

        let err = service.login(&attempt(), deadline()).await.unwrap_err();
        assert_eq!(err, GateError::DeviceLimitExceeded { limit: 2 });
    }

    #[tokio::test]
    async fn failed_suspension_still_reports_device_limit() {
        let account_id = Uuid::now_v7();
        let mut accounts = MockAccountDirectory::new();
        accounts
            .expect_status()
            .returning(|_| Ok(Some(AccountStatus::Active)));
        accounts
            .expect_suspend()
            .returning(|_, _| Err(anyhow::anyhow!("write timeout")));
        let mut registry = MockDeviceRegistry::new();
        registry.expect_find().returning(|_, _| Ok(None));
        registry.expect_count_active().returning(|_| Ok(5));
        registry.expect_upsert_login().never();

        let service = LoginAdmissionService::new(
            Arc::new(authenticator(account_id)),
            Arc::new(accounts),
            SessionAdmissionGate::new(Arc::new(registry), AdmissionPolicy::default()),
            AdmissionMode::CheckThenRecord,
        );

        let err = service.login(&attempt(), deadline()).await.unwrap_err();
        assert_eq!(err, GateError::DeviceLimitExceeded { limit: 5 });
    }

    #[tokio::test]
    async fn unknown_account_is_unauthenticated() {
        let mut accounts = MockAccountDirectory::new();
        accounts.expect_status().returning(|_| Ok(None));

        let service = LoginAdmissionService::new(
            Arc::new(authenticator(Uuid::now_v7())),
            Arc::new(accounts),
            SessionAdmissionGate::new(
                Arc::new(MockDeviceRegistry::new()),
                AdmissionPolicy::default(),
            ),
            AdmissionMode::Atomic,
        );

        let err = service.login(&attempt(), deadline()).await.unwrap_err();
        assert_eq!(err, GateError::Unauthenticated);
    }

    #[tokio::test]
    async fn device_usage_reports_slots_against_the_cap() {
        let account_id = Uuid::now_v7();
        let mut registry = MockDeviceRegistry::new();
        registry.expect_approx_active_count().returning(|_| Ok(2));

        let service = LoginAdmissionService::new(
            Arc::new(authenticator(account_id)),
            Arc::new(MockAccountDirectory::new()),
            SessionAdmissionGate::new(Arc::new(registry), AdmissionPolicy::new(4)),
            AdmissionMode::Atomic,
        );

        let usage = service.device_usage("token", deadline()).await.unwrap();
        assert_eq!(usage, DeviceUsage { active: 2, limit: 4 });
    }
}
