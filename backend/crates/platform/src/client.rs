//! Client identification utilities
//!
//! Common functions for identifying clients via the peer address and,
//! behind trusted reverse proxies, `X-Forwarded-For`.

use axum::extract::connect_info::{ConnectInfo, MockConnectInfo};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, header};
use std::convert::Infallible;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::sync::Arc;

/// Key used when no client address can be determined
pub const UNKNOWN_CLIENT_IP: &str = "unknown";

/// Reverse proxies whose `X-Forwarded-For` is believed
///
/// Installed as a request extension (`axum::Extension`); when absent,
/// no proxy is trusted and the peer address is the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies(Arc<[IpAddr]>);

impl TrustedProxies {
    pub fn new(proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        Self(proxies.into_iter().collect())
    }

    /// Comma-separated list of IP addresses; blank entries are skipped
    pub fn parse(list: &str) -> Result<Self, AddrParseError> {
        let proxies = list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse::<IpAddr>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(proxies))
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolve the client address
///
/// The direct peer is the client unless it is a trusted proxy. Behind a
/// trusted proxy, `X-Forwarded-For` is walked from the right and the first
/// hop that is not itself a trusted proxy wins. Entries left of that hop
/// are client-supplied and never consulted.
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted: &TrustedProxies,
) -> Option<IpAddr> {
    let direct = direct_ip?;
    if !trusted.contains(&direct) {
        return Some(direct);
    }

    let mut client = direct;
    for value in headers.get_all("x-forwarded-for").iter().rev() {
        let Ok(value) = value.to_str() else {
            return Some(client);
        };
        for hop in value.rsplit(',') {
            let Ok(hop) = hop.trim().parse::<IpAddr>() else {
                return Some(client);
            };
            client = hop;
            if !trusted.contains(&hop) {
                return Some(client);
            }
        }
    }
    Some(client)
}

/// Client IP as the string key used by abuse tracking
pub fn client_ip_key(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted: &TrustedProxies,
) -> String {
    extract_client_ip(headers, direct_ip, trusted)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT_IP.to_string())
}

/// Client IP key of a request, using the peer address and any
/// [`TrustedProxies`] extension
pub fn request_ip_key(headers: &HeaderMap, extensions: &Extensions) -> String {
    let trusted = extensions.get::<TrustedProxies>().cloned().unwrap_or_default();
    client_ip_key(headers, peer_ip(extensions), &trusted)
}

/// Strip a `Bearer ` prefix (case-insensitive scheme)
pub fn strip_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    } else {
        None
    }
}

/// Extract the bearer token from the `Authorization` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(strip_bearer)
        .map(str::to_string)
}

/// Peer address recorded by `into_make_service_with_connect_info`
/// (or `MockConnectInfo` in tests)
pub fn peer_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .or_else(|| {
            extensions
                .get::<MockConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        })
}

/// Client IP key of a request, never rejects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(request_ip_key(&parts.headers, &parts.extensions)))
    }
}
