use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use lectern_core::access::{DeviceRecord, LoginAttempt, LogoutRequest};
use serde::{Deserialize, Serialize};

use crate::auth::{BearerToken, ClientContext};
use crate::infra::app_state::AppState;
use crate::infra::errors::AppResult;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceLoginRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceLogoutRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub all_devices: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceView {
    pub device_id: String,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub is_active: bool,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&DeviceRecord> for DeviceView {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            device_id: record.device_id().as_str().to_string(),
            device_name: record.device_name().map(str::to_string),
            user_agent: record.user_agent().map(str::to_string),
            ip_address: record.ip_address().map(str::to_string),
            is_active: record.is_active(),
            last_seen: record.last_seen(),
            created_at: record.created_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceUsageResponse {
    pub active: u64,
    pub max_active_devices: u32,
}

/// Admit the calling device for the bearer's account.
pub async fn login_device(
    State(state): State<AppState>,
    BearerToken(bearer): BearerToken,
    client: ClientContext,
    Json(request): Json<DeviceLoginRequest>,
) -> AppResult<Json<DeviceView>> {
    let attempt = LoginAttempt {
        bearer,
        device_id: request.device_id,
        device_name: request.device_name,
        user_agent: client.user_agent,
        ip_address: client.ip_address,
    };

    let record = state.logins.login(&attempt, state.deadline()).await?;
    Ok(Json(DeviceView::from(&record)))
}

pub async fn logout_device(
    State(state): State<AppState>,
    BearerToken(bearer): BearerToken,
    client: ClientContext,
    Json(request): Json<DeviceLogoutRequest>,
) -> AppResult<StatusCode> {
    let logout = LogoutRequest {
        bearer,
        device_id: request.device_id,
        user_agent: client.user_agent,
        ip_address: client.ip_address,
        all_devices: request.all_devices,
    };

    state.logins.logout(&logout, state.deadline()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_devices(
    State(state): State<AppState>,
    BearerToken(bearer): BearerToken,
) -> AppResult<Json<DeviceListResponse>> {
    let devices = state.logins.devices(&bearer, state.deadline()).await?;
    Ok(Json(DeviceListResponse {
        devices: devices.iter().map(DeviceView::from).collect(),
    }))
}

/// Slots in use against the cap. Served from the count cache when one is
/// configured, so it may briefly trail the registry.
pub async fn device_usage(
    State(state): State<AppState>,
    BearerToken(bearer): BearerToken,
) -> AppResult<Json<DeviceUsageResponse>> {
    let usage = state.logins.device_usage(&bearer, state.deadline()).await?;
    Ok(Json(DeviceUsageResponse {
        active: usage.active,
        max_active_devices: usage.limit,
    }))
}
