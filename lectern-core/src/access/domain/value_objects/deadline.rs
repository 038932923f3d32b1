use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::error::GateError;

/// Caller-supplied bound on upstream I/O for one admission or issuance call.
///
/// Every registry, grant and catalog call made on behalf of a request runs
/// through [`Deadline::run`]. Both an elapsed deadline and a backend error
/// become [`GateError::UpstreamUnavailable`], so callers fail closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.at
    }

    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, GateError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(operation, error = %err, "upstream call failed");
                Err(GateError::upstream(operation, err))
            }
            Err(_) => Err(Self::exceeded(operation)),
        }
    }

    /// Like [`Deadline::run`] for calls that already speak [`GateError`].
    pub async fn guard<T, F>(&self, operation: &'static str, fut: F) -> Result<T, GateError>
    where
        F: Future<Output = Result<T, GateError>>,
    {
        tokio::time::timeout_at(self.at, fut)
            .await
            .unwrap_or_else(|_| Err(Self::exceeded(operation)))
    }

    fn exceeded(operation: &'static str) -> GateError {
        warn!(operation, "upstream call exceeded deadline");
        GateError::UpstreamUnavailable(format!("{operation}: deadline exceeded"))
    }
}
