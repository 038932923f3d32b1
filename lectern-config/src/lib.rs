//! Configuration library for Lectern.
//!
//! Settings come from three layers, lowest precedence first: built-in
//! defaults, an optional TOML file, then `LECTERN_*` environment variables
//! (after `.env` has been loaded). The result is validated once; missing key
//! material or secrets are fatal so the server never starts half-configured.

pub mod loader;
pub mod models;
pub mod util;

pub use loader::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, ConfigWarning, ConfigWarnings,
    error::ConfigLoadError,
};
pub use models::{
    AdmissionConfig, AuthConfig, Config, ConfigMetadata, DatabaseConfig, MediaTokenConfig,
    RedisConfig, ServerConfig,
};
