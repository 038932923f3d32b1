//! Signed media access primitives.
//!
//! The private signing key is converted once at startup into an
//! [`RsaMediaSigner`]. Tokens carry `{alg, kid}` in the header and
//! `{sub, kid, exp}` in the payload, where `sub` is the video asset id. The
//! delivery network verifies them with the matching public key; the
//! [`MediaTokenVerifier`] here performs the same checks.

mod claims;
mod signer;
mod signing_key;
mod stream_urls;
mod verifier;

pub use claims::MediaTokenClaims;
pub use signer::{MediaTokenSigner, RsaMediaSigner};
pub use signing_key::{PrivateJwk, SigningKeyError};
pub use stream_urls::StreamUrls;
pub use verifier::{MediaTokenVerifier, TokenVerificationError};
