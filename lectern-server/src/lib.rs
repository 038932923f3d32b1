//! # Lectern Server
//!
//! HTTP surface for the Lectern access gate.
//!
//! - **Device sessions**: login admission against the per-account device cap,
//!   logout, device listing and removal
//! - **Media tokens**: short-lived RS256 playback tokens for single videos,
//!   single lessons or a whole course
//!
//! Bearer credentials are HS256 access tokens issued by the platform's auth
//! service. Every upstream call made for a request shares one deadline.

pub mod auth;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use infra::errors::{AppError, AppResult};
