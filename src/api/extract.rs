//! Request extractors: caller identity, client IP and response language.

use std::net::{IpAddr, SocketAddr};

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use uuid::Uuid;

use super::error::{ApiError, ErrorCode, Locale};
use super::AppState;

/// Header carrying the caller id set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller. Missing or malformed identity is a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Uuid);

/// Caller identity when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeCaller(pub Option<Uuid>);

/// Client address used as the rate-limit key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

fn user_id(parts: &Parts) -> Option<Uuid> {
    parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id(parts).map(Caller).ok_or_else(|| {
            ApiError::localized(ErrorCode::Unauthorized, Locale::from_headers(&parts.headers))
        })
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key(USER_ID_HEADER) {
            // A present but unparseable id is not treated as anonymous.
            return Caller::from_request_parts(parts, state).await.map(|c| MaybeCaller(Some(c.0)));
        }
        Ok(MaybeCaller(None))
    }
}

/// Header set by reverse proxies.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Resolve the client address.
///
/// `forwarded` is only read when the socket peer is a trusted proxy. Hops are
/// walked from the right and the first one that is not itself a trusted
/// proxy is the client. Without a peer address every request shares the
/// `unknown` key.
pub fn resolve_client_ip(
    peer: Option<IpAddr>,
    forwarded: Option<&str>,
    is_trusted: impl Fn(&IpAddr) -> bool,
) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };
    if !is_trusted(&peer) {
        return peer.to_string();
    }
    let hops = forwarded.unwrap_or_default().rsplit(',').map(str::trim);
    for hop in hops.filter(|h| !h.is_empty()) {
        match hop.parse::<IpAddr>() {
            Ok(ip) if is_trusted(&ip) => continue,
            Ok(ip) => return ip.to_string(),
            Err(_) => break,
        }
    }
    peer.to_string()
}

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok());
        let ip = resolve_client_ip(peer, forwarded, |ip| state.config.is_trusted_proxy(ip));
        Ok(ClientIp(ip))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Locale {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Locale::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(ip: &IpAddr) -> bool {
        *ip == IpAddr::from([10, 0, 0, 1]) || *ip == IpAddr::from([10, 0, 0, 2])
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarded_header() {
        let peer = Some(IpAddr::from([203, 0, 113, 9]));
        assert_eq!(resolve_client_ip(peer, Some("198.51.100.1"), proxy), "203.0.113.9");
        assert_eq!(resolve_client_ip(peer, None, proxy), "203.0.113.9");
        assert_eq!(resolve_client_ip(None, Some("198.51.100.1"), proxy), "unknown");
    }

    #[test]
    fn test_trusted_proxy_chain() {
        let peer = Some(IpAddr::from([10, 0, 0, 1]));
        assert_eq!(resolve_client_ip(peer, Some("198.51.100.1"), proxy), "198.51.100.1");
        // Leftmost hops are client-controlled; the rightmost untrusted hop wins.
        assert_eq!(
            resolve_client_ip(peer, Some("1.2.3.4, 198.51.100.1, 10.0.0.2"), proxy),
            "198.51.100.1"
        );
        assert_eq!(resolve_client_ip(peer, Some("garbage"), proxy), "10.0.0.1");
        assert_eq!(resolve_client_ip(peer, None, proxy), "10.0.0.1");
    }
}
