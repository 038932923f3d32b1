//! Session admission and media access gate.
//!
//! The domain layer holds the business rules (fingerprints, device records,
//! the admission gate, entitlement checks, token issuance). The
//! infrastructure layer provides in-memory, PostgreSQL and cache-backed
//! implementations of the domain repositories.

pub mod domain;
pub mod infrastructure;

pub use domain::aggregates::{
    AccountStatus, DeviceRecord, DeviceState, EnrollmentGrant, EnrollmentStatus,
};
pub use domain::repositories::{
    AccountDirectory, AuthenticationVerifier, DeviceCache, DeviceRegistry, EnrollmentStore,
    MediaCatalog, RegistryAdmission, VideoAsset,
};
pub use domain::services::{
    AdmissionDecision, AdmissionMode, AdmissionPolicy, AdmissionReason, DeviceUsage,
    EnrollmentAccessVerifier, LoginAdmissionService, LoginAttempt, LogoutRequest,
    MediaAccessToken, SessionAdmissionGate, SignedMediaTokenIssuer,
};
pub use domain::value_objects::{Deadline, DeviceFingerprint, DeviceMetadata};
