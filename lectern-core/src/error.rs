use thiserror::Error;

/// Outcome kinds surfaced by admission and issuance.
///
/// Expected kinds (`DeviceLimitExceeded`, `AccessDenied`, `Unauthenticated`,
/// `AccountSuspended`, `DeviceNotFound`, `MediaNotFound`, `MediaNotReady`)
/// are user-actionable.
/// `UpstreamUnavailable` is transient and always resolves to a denial.
/// `Configuration` is fatal and should abort startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Maximum of {limit} devices already signed in. Sign out from another device before trying again.")]
    DeviceLimitExceeded { limit: u32 },

    #[error("You do not have access to this course")]
    AccessDenied,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Account is suspended")]
    AccountSuspended,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Device not found")]
    DeviceNotFound,

    /// Carries the missed lookup key for logs; never shown to clients.
    #[error("Media not found")]
    MediaNotFound(String),

    #[error("Media is not ready (status: {status})")]
    MediaNotReady { status: String },
}

impl GateError {
    pub fn upstream(context: &str, err: impl std::fmt::Display) -> Self {
        Self::UpstreamUnavailable(format!("{context}: {err}"))
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DeviceLimitExceeded { .. } => "device_limit_exceeded",
            Self::AccessDenied => "needs_purchase",
            Self::Unauthenticated => "unauthenticated",
            Self::AccountSuspended => "account_suspended",
            Self::Configuration(_) => "configuration_error",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::DeviceNotFound => "device_not_found",
            Self::MediaNotFound(_) => "media_not_found",
            Self::MediaNotReady { .. } => "media_not_ready",
        }
    }

    /// Whether the error hides internal detail from end users.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::UpstreamUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
