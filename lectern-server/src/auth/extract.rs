use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use lectern_core::GateError;

use crate::infra::app_state::AppState;
use crate::infra::errors::AppError;

/// Raw bearer credential from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(GateError::Unauthenticated)?;

        let (scheme, token) = header
            .trim()
            .split_once(' ')
            .ok_or(GateError::Unauthenticated)?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(GateError::Unauthenticated.into());
        }
        Ok(Self(token.to_string()))
    }
}

/// Client hints used to fingerprint a device.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl ClientContext {
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Self {
        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let forwarded = trust_proxy
            .then(|| first_forwarded_hop(headers))
            .flatten();
        let ip_address = forwarded.or_else(|| peer.map(|addr| addr.ip().to_string()));

        Self {
            user_agent,
            ip_address,
        }
    }
}

fn first_forwarded_hop(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
}

impl FromRequestParts<AppState> for ClientContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_parts(
            &parts.headers,
            peer,
            state.settings.trust_proxy_headers,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some(SocketAddr::from(([198, 51, 100, 7], 51000)))
    }

    #[test]
    fn first_forwarded_hop_wins_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.9 , 10.0.0.2"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("UA-X"));

        let ctx = ClientContext::from_parts(&headers, peer(), true);
        assert_eq!(ctx.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(ctx.user_agent.as_deref(), Some("UA-X"));

        let ctx = ClientContext::from_parts(&headers, peer(), false);
        assert_eq!(ctx.ip_address.as_deref(), Some("198.51.100.7"));
    }

    #[test]
    fn falls_back_to_peer_address() {
        let ctx = ClientContext::from_parts(&HeaderMap::new(), peer(), true);
        assert_eq!(ctx.ip_address.as_deref(), Some("198.51.100.7"));
        assert!(ctx.user_agent.is_none());
    }
}
