use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::{non_empty, parse_bool};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub admission: FileAdmissionConfig,
    #[serde(default)]
    pub media: FileMediaConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_proxy_headers: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
    /// Humantime duration, e.g. `"30s"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_count_ttl: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAdmissionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_active_devices: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMediaConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl_hours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ttl_hours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_code: Option<String>,
}

/// Environment-derived configuration values.
///
/// Numeric values are kept raw so the loader can report or fall back on
/// malformed input instead of silently dropping it.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<String>,
    pub trust_proxy_headers: Option<bool>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<String>,
    pub redis_url: Option<String>,
    pub device_count_ttl: Option<String>,
    pub jwt_secret: Option<String>,
    pub max_active_devices: Option<String>,
    pub admission_mode: Option<String>,
    pub upstream_timeout: Option<String>,
    pub media_key_id: Option<String>,
    pub media_jwk: Option<String>,
    pub media_jwk_file: Option<PathBuf>,
    pub media_token_ttl_hours: Option<String>,
    pub media_token_max_ttl_hours: Option<String>,
    pub stream_customer_code: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| non_empty(lookup(name));
        Self {
            config_path: var("LECTERN_CONFIG").map(PathBuf::from),
            server_host: var("LECTERN_HOST"),
            server_port: var("LECTERN_PORT"),
            trust_proxy_headers: var("LECTERN_TRUST_PROXY_HEADERS").and_then(|v| parse_bool(&v)),
            database_url: var("DATABASE_URL"),
            database_max_connections: var("LECTERN_DB_MAX_CONNECTIONS"),
            redis_url: var("LECTERN_REDIS_URL").or_else(|| var("REDIS_URL")),
            device_count_ttl: var("LECTERN_DEVICE_CACHE_TTL"),
            jwt_secret: var("LECTERN_JWT_SECRET"),
            max_active_devices: var("LECTERN_MAX_ACTIVE_DEVICES"),
            admission_mode: var("LECTERN_ADMISSION_MODE"),
            upstream_timeout: var("LECTERN_UPSTREAM_TIMEOUT"),
            media_key_id: var("LECTERN_MEDIA_KEY_ID"),
            media_jwk: var("LECTERN_MEDIA_JWK"),
            media_jwk_file: var("LECTERN_MEDIA_JWK_FILE").map(PathBuf::from),
            media_token_ttl_hours: var("LECTERN_MEDIA_TOKEN_TTL_HOURS"),
            media_token_max_ttl_hours: var("LECTERN_MEDIA_TOKEN_MAX_TTL_HOURS"),
            stream_customer_code: var("LECTERN_STREAM_CUSTOMER_CODE"),
        }
    }
}
