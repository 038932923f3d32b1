pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lectern_core::access::{AdmissionMode, AdmissionPolicy};
use tracing::{debug, info};

use crate::models::sources::{EnvConfig, FileConfig};
use crate::models::{
    AdmissionConfig, AuthConfig, Config, ConfigMetadata, DEFAULT_DB_MAX_CONNECTIONS,
    DEFAULT_DEVICE_CACHE_TTL, DEFAULT_HOST, DEFAULT_MEDIA_TOKEN_MAX_TTL_HOURS,
    DEFAULT_MEDIA_TOKEN_TTL_HOURS, DEFAULT_PORT, DEFAULT_UPSTREAM_TIMEOUT, DatabaseConfig, MediaTokenConfig, RedisConfig, ServerConfig,
};
use crate::util::parse_duration;

use self::error::ConfigLoadError;

const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["lectern.toml", "config/lectern.toml"];

#[derive(Debug, Clone, Default)]
pub struct ConfigLoaderOptions {
    /// Explicit TOML path; a missing file is an error when set
    pub config_path: Option<PathBuf>,
    /// Env file to load instead of `./.env`
    pub env_file: Option<PathBuf>,
    /// Skip `.env` loading entirely
    pub skip_env_file: bool,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    fn push(&mut self, message: impl Into<String>, hint: Option<&str>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: hint.map(str::to_string),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    /// Load `.env`, the TOML file and the process environment, then resolve.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        let env = EnvConfig::gather();
        let (file, config_path) = self.read_file(&env)?;

        let mut load = resolve(file, env)?;
        load.config.metadata = ConfigMetadata {
            config_path,
            env_file_loaded,
        };
        Ok(load)
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        if self.options.skip_env_file {
            return Ok(false);
        }
        let result = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| path.clone()),
            None => dotenvy::dotenv(),
        };
        match result {
            Ok(path) => {
                debug!(path = %path.display(), "loaded env file");
                Ok(true)
            }
            // A missing default .env is normal
            Err(dotenvy::Error::Io(err))
                if self.options.env_file.is_none()
                    && err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(false)
            }
            Err(source) => Err(ConfigLoadError::EnvFile {
                path: self
                    .options
                    .env_file
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(".env")),
                source,
            }),
        }
    }

    fn read_file(
        &self,
        env: &EnvConfig,
    ) -> Result<(FileConfig, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if path.exists() => path,
            Some(path) => return Err(ConfigLoadError::MissingConfig { path }),
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((FileConfig::default(), None)),
            },
        };

        let file = parse_file(&path)?;
        info!(path = %path.display(), "loaded configuration file");
        Ok((file, Some(path)))
    }
}

fn parse_file(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge file values under environment values and validate the result.
///
/// Environment always wins. Missing secrets and key material are fatal;
/// out-of-range tunables fall back to defaults with a warning.
pub fn resolve(file: FileConfig, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    let port = match env.server_port.as_deref() {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|err| ConfigLoadError::InvalidValue {
                field: "LECTERN_PORT",
                message: err.to_string(),
            })?,
        None => file.server.port.unwrap_or(DEFAULT_PORT),
    };
    let server = ServerConfig {
        host: env
            .server_host
            .clone()
            .or_else(|| file.server.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port,
        trust_proxy_headers: env
            .trust_proxy_headers
            .or(file.server.trust_proxy_headers)
            .unwrap_or(true),
    };

    let max_connections = match env.database_max_connections.as_deref() {
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) if value > 0 => value,
            _ => {
                warnings.push(
                    format!("ignoring LECTERN_DB_MAX_CONNECTIONS={raw}"),
                    Some("expected a positive integer"),
                );
                DEFAULT_DB_MAX_CONNECTIONS
            }
        },
        None => file
            .database
            .max_connections
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
    };
    let database = DatabaseConfig {
        url: env
            .database_url
            .clone()
            .or_else(|| file.database.url.clone()),
        max_connections,
    };
    if database.url.is_none() {
        warnings.push(
            "no database URL configured",
            Some("set DATABASE_URL; `serve` requires it"),
        );
    }

    let redis = resolve_redis(&file, &env, &mut warnings);

    let jwt_secret = env
        .jwt_secret
        .clone()
        .or_else(|| file.auth.jwt_secret.clone())
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigLoadError::MissingJwtSecret)?;

    let admission = resolve_admission(&file, &env, &mut warnings)?;
    let media = resolve_media(&file, &env, &mut warnings)?;

    let config = Config {
        server,
        database,
        redis,
        auth: AuthConfig { jwt_secret },
        admission,
        media,
        metadata: ConfigMetadata::default(),
    };
    Ok(ConfigLoad { config, warnings })
}

fn resolve_redis(
    file: &FileConfig,
    env: &EnvConfig,
    warnings: &mut ConfigWarnings,
) -> Option<RedisConfig> {
    let file_redis = file.redis.as_ref();
    let url = env
        .redis_url
        .clone()
        .or_else(|| file_redis.map(|r| r.url.clone()))
        .filter(|u| !u.trim().is_empty())?;

    let raw_ttl = env
        .device_count_ttl
        .clone()
        .or_else(|| file_redis.and_then(|r| r.device_count_ttl.clone()));
    let device_count_ttl = duration_or_default(
        "device count TTL",
        raw_ttl.as_deref(),
        DEFAULT_DEVICE_CACHE_TTL,
        warnings,
    );

    Some(RedisConfig {
        url,
        device_count_ttl,
    })
}

fn resolve_admission(
    file: &FileConfig,
    env: &EnvConfig,
    warnings: &mut ConfigWarnings,
) -> Result<AdmissionConfig, ConfigLoadError> {
    let raw_cap = env
        .max_active_devices
        .clone()
        .or_else(|| file.admission.max_active_devices.map(|v| v.to_string()));
    if let Some(raw) = raw_cap.as_deref()
        && !matches!(raw.trim().parse::<i64>(), Ok(v) if v > 0)
    {
        warnings.push(
            format!("ignoring max active devices `{raw}`"),
            Some("expected a positive integer; using 5"),
        );
    }
    let policy = AdmissionPolicy::from_setting(raw_cap.as_deref());

    let mode = match env
        .admission_mode
        .as_deref()
        .or(file.admission.mode.as_deref())
    {
        Some(raw) => raw
            .parse::<AdmissionMode>()
            .map_err(|message| ConfigLoadError::InvalidValue {
                field: "admission.mode",
                message,
            })?,
        None => AdmissionMode::default(),
    };

    let upstream_timeout = match env
        .upstream_timeout
        .as_deref()
        .or(file.admission.upstream_timeout.as_deref())
    {
        Some(raw) => parse_duration(raw)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigLoadError::InvalidValue {
                field: "admission.upstream_timeout",
                message: format!("`{raw}` is not a positive duration"),
            })?,
        None => DEFAULT_UPSTREAM_TIMEOUT,
    };

    Ok(AdmissionConfig {
        policy,
        mode,
        upstream_timeout,
    })
}

fn resolve_media(
    file: &FileConfig,
    env: &EnvConfig,
    warnings: &mut ConfigWarnings,
) -> Result<MediaTokenConfig, ConfigLoadError> {
    let media = &file.media;

    let signing_jwk = match (&env.media_jwk, &env.media_jwk_file, &media.jwk, &media.jwk_file) {
        (Some(inline), ..) => inline.clone(),
        (None, Some(path), ..) => read_key_file(path)?,
        (None, None, Some(inline), _) => inline.clone(),
        (None, None, None, Some(path)) => read_key_file(path)?,
        (None, None, None, None) => return Err(ConfigLoadError::MissingSigningKey),
    };
    if signing_jwk.trim().is_empty() {
        return Err(ConfigLoadError::MissingSigningKey);
    }

    let default_ttl_hours = hours_or_default(
        "LECTERN_MEDIA_TOKEN_TTL_HOURS",
        env.media_token_ttl_hours.as_deref(),
        media.default_ttl_hours,
        DEFAULT_MEDIA_TOKEN_TTL_HOURS,
        warnings,
    );
    let max_ttl_hours = hours_or_default(
        "LECTERN_MEDIA_TOKEN_MAX_TTL_HOURS",
        env.media_token_max_ttl_hours.as_deref(),
        media.max_ttl_hours,
        DEFAULT_MEDIA_TOKEN_MAX_TTL_HOURS,
        warnings,
    );
    if default_ttl_hours > max_ttl_hours {
        warnings.push(
            format!("media token default ttl {default_ttl_hours}h exceeds the {max_ttl_hours}h maximum"),
            Some("tokens will be issued with the maximum"),
        );
    }

    let customer_code = env
        .stream_customer_code
        .clone()
        .or_else(|| media.customer_code.clone());
    if customer_code.is_none() {
        warnings.push(
            "no stream customer code configured",
            Some("set LECTERN_STREAM_CUSTOMER_CODE to include stream URLs in token responses"),
        );
    }

    Ok(MediaTokenConfig {
        key_id: env.media_key_id.clone().or_else(|| media.key_id.clone()),
        signing_jwk,
        default_ttl_hours,
        max_ttl_hours,
        customer_code,
    })
}

fn read_key_file(path: &Path) -> Result<String, ConfigLoadError> {
    fs::read_to_string(path)
        .map(|raw| raw.trim().to_string())
        .map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn hours_or_default(
    name: &str,
    env_raw: Option<&str>,
    file_value: Option<u32>,
    default: u32,
    warnings: &mut ConfigWarnings,
) -> u32 {
    match env_raw {
        Some(raw) => match raw.parse::<u32>() {
            Ok(hours) if hours > 0 => hours,
            _ => {
                warnings.push(
                    format!("ignoring {name}={raw}"),
                    Some("expected a positive number of hours"),
                );
                default
            }
        },
        None => file_value.filter(|h| *h > 0).unwrap_or(default),
    }
}

fn duration_or_default(
    name: &str,
    raw: Option<&str>,
    default: Duration,
    warnings: &mut ConfigWarnings,
) -> Duration {
    let Some(raw) = raw else {
        return default;
    };
    match parse_duration(raw).filter(|d| !d.is_zero()) {
        Some(duration) => duration,
        None => {
            warnings.push(
                format!("ignoring {name} `{raw}`"),
                Some("expected a duration such as `30s`"),
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvConfig {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|name| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("LECTERN_JWT_SECRET", "s3cret"),
            ("LECTERN_MEDIA_JWK", "{\"kty\":\"RSA\"}"),
        ]
    }

    #[test]
    fn defaults_apply_without_file() {
        let load = resolve(FileConfig::default(), env(&minimal())).unwrap();
        let config = load.config;

        assert_eq!(config.server.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.admission.policy.max_active_devices(), 5);
        assert_eq!(config.admission.mode, AdmissionMode::Atomic);
        assert_eq!(config.admission.upstream_timeout, DEFAULT_UPSTREAM_TIMEOUT);
        assert_eq!(config.media.default_ttl_hours, 2);
        assert_eq!(config.media.max_ttl_hours, 24);
        assert!(config.redis.is_none());
    }

    #[test]
    fn non_positive_cap_falls_back_with_warning() {
        let mut vars = minimal();
        vars.push(("LECTERN_MAX_ACTIVE_DEVICES", "-3"));
        let load = resolve(FileConfig::default(), env(&vars)).unwrap();

        assert_eq!(load.config.admission.policy.max_active_devices(), 5);
        assert!(
            load.warnings
                .items
                .iter()
                .any(|w| w.message.contains("max active devices"))
        );
    }

    #[test]
    fn missing_signing_key_is_fatal() {
        let err = resolve(
            FileConfig::default(),
            env(&[("LECTERN_JWT_SECRET", "s3cret")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingSigningKey));
    }

    #[test]
    fn unknown_admission_mode_is_rejected() {
        let mut vars = minimal();
        vars.push(("LECTERN_ADMISSION_MODE", "optimistic"));
        let err = resolve(FileConfig::default(), env(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidValue {
                field: "admission.mode",
                ..
            }
        ));
    }

    #[test]
    fn max_ttl_comes_from_env_and_bad_values_fall_back() {
        let mut vars = minimal();
        vars.push(("LECTERN_MEDIA_TOKEN_MAX_TTL_HOURS", "4"));
        vars.push(("LECTERN_MEDIA_TOKEN_TTL_HOURS", "8"));
        let load = resolve(FileConfig::default(), env(&vars)).unwrap();
        assert_eq!(load.config.media.max_ttl_hours, 4);
        assert!(
            load.warnings
                .items
                .iter()
                .any(|w| w.message.contains("exceeds the 4h maximum"))
        );

        let mut vars = minimal();
        vars.push(("LECTERN_MEDIA_TOKEN_MAX_TTL_HOURS", "0"));
        let load = resolve(FileConfig::default(), env(&vars)).unwrap();
        assert_eq!(load.config.media.max_ttl_hours, DEFAULT_MEDIA_TOKEN_MAX_TTL_HOURS);
    }
}
