use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lectern_core::GateError;
use lectern_core::access::{
    AuthenticationVerifier, Deadline, LoginAdmissionService, SignedMediaTokenIssuer,
};
use uuid::Uuid;

/// Per-request knobs resolved from configuration.
#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub upstream_timeout: Duration,
    pub trust_proxy_headers: bool,
    pub stream_customer_code: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub logins: Arc<LoginAdmissionService>,
    pub media_tokens: Arc<SignedMediaTokenIssuer>,
    pub authenticator: Arc<dyn AuthenticationVerifier>,
    pub settings: Arc<RequestSettings>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Fresh deadline covering every upstream call of one request.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.settings.upstream_timeout)
    }

    pub async fn authenticate(&self, bearer: &str, deadline: Deadline) -> Result<Uuid, GateError> {
        deadline
            .guard("authenticate", self.authenticator.authenticate(bearer))
            .await
    }
}
