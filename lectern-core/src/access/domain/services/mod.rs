// Admission domain services
// Services coordinate aggregates and repositories to implement the login
// and media access workflows.

mod enrollment_access_verifier;
mod login_admission_service;
mod session_admission_gate;
mod signed_media_token_issuer;

pub use enrollment_access_verifier::EnrollmentAccessVerifier;
pub use login_admission_service::{
    DeviceUsage, LoginAdmissionService, LoginAttempt, LogoutRequest,
};
pub use session_admission_gate::{
    AdmissionDecision, AdmissionMode, AdmissionPolicy, AdmissionReason, SessionAdmissionGate,
};
pub use signed_media_token_issuer::{MediaAccessToken, SignedMediaTokenIssuer};
