//! # Lectern Core
//!
//! Core library for the Lectern learning platform backend. It owns the two
//! security-sensitive pieces of the platform:
//!
//! - **Session admission**: recognising devices, enforcing the per-account
//!   active device cap, recording and retiring device sessions, and
//!   suspending accounts that exceed the cap.
//! - **Signed media access**: checking course entitlements and minting
//!   short-lived RS256 tokens that authorize playback of one video asset.
//!
//! Everything else on the platform (courses, orders, payments, storage) is an
//! external collaborator reached through the repository traits in
//! [`access::domain::repositories`].
//!
//! ## Feature Flags
//!
//! - `database`: PostgreSQL repositories, the embedded [`MIGRATOR`] and the
//!   Redis device-count cache.
//!
//! ## Architecture
//!
//! - [`access`]: device fingerprints, the device registry, the admission gate,
//!   the enrollment verifier and the media token issuer
//! - [`media`]: signing keys, token claims, the peer-side verifier and stream
//!   URLs
//! - [`clock`]: time source shared by every component
//! - [`error`]: the [`GateError`] taxonomy returned to callers

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod access;
pub mod clock;
pub mod error;
pub mod media;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{GateError, Result};
