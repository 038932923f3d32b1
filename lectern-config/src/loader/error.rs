use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file not found at {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to load env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error(
        "no media signing key configured; set LECTERN_MEDIA_JWK or LECTERN_MEDIA_JWK_FILE"
    )]
    MissingSigningKey,
    #[error("no bearer secret configured; set LECTERN_JWT_SECRET")]
    MissingJwtSecret,
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}
