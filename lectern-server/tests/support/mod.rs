#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum_test::TestServer;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use lectern_config::Config;
use lectern_config::loader::resolve;
use lectern_config::models::sources::{EnvConfig, FileConfig};
use lectern_core::access::infrastructure::memory::{
    InMemoryAccountDirectory, InMemoryDeviceRegistry, InMemoryEnrollmentStore,
    InMemoryMediaCatalog,
};
use lectern_server::auth::AccessClaims;
use lectern_server::infra::startup::{Collaborators, build_state};
use lectern_server::routes::create_app;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-bearer-secret";
pub const CUSTOMER_CODE: &str = "lectern-test";
pub const SIGNING_KEY_ID: &str = "test-key";
pub const SIGNING_KEY_JWK: &str =
    include_str!("../../../lectern-core/tests/fixtures/media_signing_key.json");
pub const SIGNING_KEY_PUBLIC_PEM: &str =
    include_str!("../../../lectern-core/tests/fixtures/media_signing_key.pub.pem");

pub struct TestApp {
    pub server: TestServer,
    pub accounts: Arc<InMemoryAccountDirectory>,
    pub registry: Arc<InMemoryDeviceRegistry>,
    pub enrollments: Arc<InMemoryEnrollmentStore>,
    pub catalog: Arc<InMemoryMediaCatalog>,
}

pub fn config(max_active_devices: &str) -> Config {
    let vars = [
        ("LECTERN_JWT_SECRET", JWT_SECRET),
        ("LECTERN_MEDIA_JWK", SIGNING_KEY_JWK),
        ("LECTERN_MAX_ACTIVE_DEVICES", max_active_devices),
        ("LECTERN_STREAM_CUSTOMER_CODE", CUSTOMER_CODE),
        ("LECTERN_UPSTREAM_TIMEOUT", "2s"),
    ];
    let env = EnvConfig::from_lookup(|name| {
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    });
    resolve(FileConfig::default(), env)
        .expect("test configuration resolves")
        .config
}

pub fn build_test_app(max_active_devices: u32) -> TestApp {
    let accounts = Arc::new(InMemoryAccountDirectory::new());
    let registry = Arc::new(InMemoryDeviceRegistry::default());
    let enrollments = Arc::new(InMemoryEnrollmentStore::new());
    let catalog = Arc::new(InMemoryMediaCatalog::new());

    let collaborators = Collaborators {
        registry: registry.clone(),
        accounts: accounts.clone(),
        enrollments: enrollments.clone(),
        catalog: catalog.clone(),
    };
    let state = build_state(&config(&max_active_devices.to_string()), collaborators)
        .expect("state builds from fixture key");

    let make_service = create_app(state).into_make_service_with_connect_info::<SocketAddr>();
    let server = TestServer::builder()
        .http_transport()
        .build(make_service)
        .expect("test server starts");

    TestApp {
        server,
        accounts,
        registry,
        enrollments,
        catalog,
    }
}

impl TestApp {
    /// Registers an active account and returns it with a valid bearer header.
    pub fn account(&self) -> (Uuid, String) {
        let account = Uuid::now_v7();
        self.accounts.insert_active(account);
        (account, bearer(account))
    }
}

pub fn bearer(account: Uuid) -> String {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: account,
        exp: (now + Duration::minutes(15)).timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode bearer");
    format!("Bearer {token}")
}
