use std::sync::Arc;

use anyhow::{Context, Result};
use lectern_config::Config;
use lectern_core::GateError;
use lectern_core::access::infrastructure::cache::{CachedDeviceRegistry, RedisDeviceCache};
use lectern_core::access::infrastructure::repositories::{
    PostgresAccountDirectory, PostgresDeviceRegistry, PostgresEnrollmentStore,
    PostgresMediaCatalog,
};
use lectern_core::access::{
    AccountDirectory, AuthenticationVerifier, DeviceRegistry, EnrollmentAccessVerifier,
    EnrollmentStore, LoginAdmissionService, MediaCatalog, SessionAdmissionGate,
    SignedMediaTokenIssuer,
};
use lectern_core::media::{MediaTokenSigner, RsaMediaSigner};
use lectern_core::{Clock, SystemClock};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::JwtBearerVerifier;
use crate::infra::app_state::{AppState, RequestSettings};

/// Storage-facing collaborators the gate is wired against.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn DeviceRegistry>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub enrollments: Arc<dyn EnrollmentStore>,
    pub catalog: Arc<dyn MediaCatalog>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

pub async fn connect_pool(config: &Config) -> Result<PgPool> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        anyhow::bail!("Invalid database URL: must start with postgres:// or postgresql://");
    }

    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(url)
        .await
        .context("failed to connect to PostgreSQL")
}

/// PostgreSQL repositories, with the Redis count cache in front of the
/// device registry when Redis is configured. A Redis outage at startup only
/// disables the cache.
pub async fn postgres_collaborators(config: &Config, pool: PgPool) -> Collaborators {
    let registry = PostgresDeviceRegistry::new(pool.clone());

    let registry: Arc<dyn DeviceRegistry> = match &config.redis {
        Some(redis) => {
            match RedisDeviceCache::connect(&redis.url, redis.device_count_ttl).await {
                Ok(cache) => {
                    info!(ttl = ?redis.device_count_ttl, "device count cache enabled");
                    Arc::new(CachedDeviceRegistry::new(registry, Arc::new(cache)))
                }
                Err(err) => {
                    warn!(error = %err, "redis unavailable, device count cache disabled");
                    Arc::new(registry)
                }
            }
        }
        None => Arc::new(registry),
    };

    Collaborators {
        registry,
        accounts: Arc::new(PostgresAccountDirectory::new(pool.clone())),
        enrollments: Arc::new(PostgresEnrollmentStore::new(pool.clone())),
        catalog: Arc::new(PostgresMediaCatalog::new(pool)),
    }
}

/// Assemble the request state. Fails when the signing key cannot be
/// converted, which must abort startup.
pub fn build_state(config: &Config, collaborators: Collaborators) -> Result<AppState, GateError> {
    build_state_with_clock(config, collaborators, Arc::new(SystemClock))
}

pub fn build_state_with_clock(
    config: &Config,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
) -> Result<AppState, GateError> {
    let signer = RsaMediaSigner::from_jwk(config.media.key_id.as_deref(), &config.media.signing_jwk)?;
    info!(key_id = signer.key_id(), "media signing key loaded");

    let authenticator: Arc<dyn AuthenticationVerifier> =
        Arc::new(JwtBearerVerifier::new(&config.auth.jwt_secret));

    let gate = SessionAdmissionGate::new(collaborators.registry, config.admission.policy);
    let logins = LoginAdmissionService::new(
        authenticator.clone(),
        collaborators.accounts,
        gate,
        config.admission.mode,
    );

    let media_tokens = SignedMediaTokenIssuer::new(
        EnrollmentAccessVerifier::new(collaborators.enrollments, clock.clone()),
        Arc::new(signer),
        collaborators.catalog,
        clock,
    )
    .with_default_ttl_hours(config.media.default_ttl_hours)
    .with_max_ttl_hours(config.media.max_ttl_hours);

    info!(
        admission.max_active_devices = config.admission.policy.max_active_devices(),
        admission.mode = %config.admission.mode,
        admission.upstream_timeout = ?config.admission.upstream_timeout,
        media.default_ttl_hours = config.media.default_ttl_hours,
        media.max_ttl_hours = config.media.max_ttl_hours,
        "access gate configuration in effect"
    );

    Ok(AppState {
        logins: Arc::new(logins),
        media_tokens: Arc::new(media_tokens),
        authenticator,
        settings: Arc::new(RequestSettings {
            upstream_timeout: config.admission.upstream_timeout,
            trust_proxy_headers: config.server.trust_proxy_headers,
            stream_customer_code: config.media.customer_code.clone(),
        }),
    })
}
