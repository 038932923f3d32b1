pub mod sources;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use lectern_core::access::{AdmissionMode, AdmissionPolicy};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_DEVICE_CACHE_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_MEDIA_TOKEN_TTL_HOURS: u32 = 2;
pub const DEFAULT_MEDIA_TOKEN_MAX_TTL_HOURS: u32 = 24;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    pub admission: AdmissionConfig,
    pub media: MediaTokenConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Take the client address from the first `X-Forwarded-For` hop
    pub trust_proxy_headers: bool,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub device_count_ttl: Duration,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for verifying platform bearer tokens
    pub jwt_secret: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AdmissionConfig {
    pub policy: AdmissionPolicy,
    pub mode: AdmissionMode,
    /// Budget for every upstream call made on behalf of one request
    pub upstream_timeout: Duration,
}

#[derive(Clone)]
pub struct MediaTokenConfig {
    pub key_id: Option<String>,
    /// Private JWK, raw JSON or base64-wrapped JSON
    pub signing_jwk: String,
    pub default_ttl_hours: u32,
    /// Upper bound for client-requested lifetimes
    pub max_ttl_hours: u32,
    /// Stream delivery customer code; stream URLs are omitted without it
    pub customer_code: Option<String>,
}

impl fmt::Debug for MediaTokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTokenConfig")
            .field("key_id", &self.key_id)
            .field("default_ttl_hours", &self.default_ttl_hours)
            .field("max_ttl_hours", &self.max_ttl_hours)
            .field("customer_code", &self.customer_code)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
