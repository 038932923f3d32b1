use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lectern_core::GateError;
use serde_json::json;
use std::fmt;
use tracing::{debug, error};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    /// Device cap reported with `device_limit_exceeded`
    pub limit: Option<u32>,
    pub needs_purchase: bool,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            limit: None,
            needs_purchase: false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "code": self.code,
            "message": self.message,
            "status": self.status.as_u16(),
        });
        if let Some(limit) = self.limit {
            body["limit"] = json!(limit);
        }
        if self.needs_purchase {
            body["needs_purchase"] = json!(true);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        let code = err.code();
        match err {
            GateError::DeviceLimitExceeded { limit } => Self {
                limit: Some(limit),
                ..Self::new(StatusCode::FORBIDDEN, code, err.to_string())
            },
            GateError::AccessDenied => Self {
                needs_purchase: true,
                ..Self::new(StatusCode::FORBIDDEN, code, err.to_string())
            },
            GateError::AccountSuspended => Self::new(StatusCode::FORBIDDEN, code, err.to_string()),
            GateError::Unauthenticated => {
                Self::new(StatusCode::UNAUTHORIZED, code, err.to_string())
            }
            GateError::DeviceNotFound => Self::new(StatusCode::NOT_FOUND, code, err.to_string()),
            GateError::MediaNotFound(ref detail) => {
                debug!(detail = %detail, "media lookup missed");
                Self::new(StatusCode::NOT_FOUND, code, "Media not found")
            }
            GateError::MediaNotReady { .. } => {
                Self::new(StatusCode::CONFLICT, code, err.to_string())
            }
            GateError::UpstreamUnavailable(ref detail) => {
                error!(detail = %detail, "upstream dependency unavailable");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    code,
                    "Service temporarily unavailable, please retry",
                )
            }
            GateError::Configuration(ref detail) => {
                error!(detail = %detail, "gate misconfigured");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, "Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_details_stay_out_of_the_message() {
        let err = AppError::from(GateError::UpstreamUnavailable(
            "device registry: connection refused to 10.0.0.5".into(),
        ));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message.contains("10.0.0.5"));

        let err = AppError::from(GateError::Configuration("bad jwk".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("jwk"));
    }

    #[test]
    fn device_limit_carries_the_cap() {
        let err = AppError::from(GateError::DeviceLimitExceeded { limit: 2 });
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "device_limit_exceeded");
        assert_eq!(err.limit, Some(2));
    }

    #[test]
    fn missing_media_does_not_echo_the_lookup_key() {
        let err = AppError::from(GateError::MediaNotFound("course zz".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "media_not_found");
        assert_eq!(err.message, "Media not found");
    }
}
