pub mod extract;
pub mod jwt;

pub use extract::{BearerToken, ClientContext};
pub use jwt::{AccessClaims, JwtBearerVerifier};
