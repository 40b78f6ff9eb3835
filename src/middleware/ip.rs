//! Client address normalization.
//!
//! Behind a reverse proxy the TCP peer is the proxy, not the client. This
//! layer works out the address that should be attributed to the request and
//! stores it as a [`ClientAddr`] extension for the layers below it.
//!
//! # Resolution Order
//!
//! 1. If the TCP peer is a trusted proxy, the first *public* address in
//!    `X-Forwarded-For`, keeping the peer's port.
//! 2. Same condition, the `X-Real-IP` address if it parses.
//! 3. The TCP peer address (`ConnectInfo<SocketAddr>`).
//! 4. [`UNKNOWN_CLIENT`].
//!
//! An empty `TRUSTED_PROXIES` list trusts every peer. Without connect info
//! (e.g. requests driven directly through `oneshot` in tests) forwarded
//! headers are honored only when the list is empty.
//!
//! # Security Warning
//!
//! Forwarded headers are set by clients as easily as by proxies. Configure
//! `TRUSTED_PROXIES` whenever the service is reachable without going through
//! your proxy.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Fallback when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";

// =============================================================================
// Trusted Proxy CIDR Matching
// =============================================================================

/// Parsed CIDR network range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrRange {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrRange {
    /// Parse CIDR notation (`10.0.0.0/8`, `::1/128`) or a bare address.
    ///
    /// Returns `None` if the format is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let (addr, prefix) = match cidr.trim().split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (cidr.trim(), None),
        };

        let network: IpAddr = addr.parse().ok()?;
        let max_prefix = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix_len = match prefix {
            Some(p) => p.parse::<u8>().ok()?,
            None => max_prefix,
        };
        if prefix_len > max_prefix {
            return None;
        }

        Some(Self {
            network,
            prefix_len,
        })
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u32::from(*net) & mask) == (u32::from(*addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u128::from(*net) & mask) == (u128::from(*addr) & mask)
            }
            _ => false,
        }
    }
}

/// Peers whose forwarded headers are believed.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxyConfig {
    ranges: Vec<CidrRange>,
}

impl TrustedProxyConfig {
    /// Build from CIDR strings. Invalid entries are logged and skipped.
    pub fn new(cidrs: &[String]) -> Self {
        let ranges: Vec<CidrRange> = cidrs
            .iter()
            .filter_map(|cidr| {
                let parsed = CidrRange::parse(cidr);
                if parsed.is_none() {
                    warn!(cidr = %cidr, "Invalid CIDR range in TRUSTED_PROXIES, skipping");
                }
                parsed
            })
            .collect();

        Self { ranges }
    }

    /// Whether any ranges are configured. When not, every peer is trusted.
    pub fn is_enabled(&self) -> bool {
        !self.ranges.is_empty()
    }

    pub fn is_trusted(&self, peer: Option<&IpAddr>) -> bool {
        if self.ranges.is_empty() {
            return true;
        }
        match peer {
            Some(ip) => self.ranges.iter().any(|range| range.contains(ip)),
            None => false,
        }
    }
}

// =============================================================================
// Address Extraction
// =============================================================================

/// Normalized client address attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(String);

impl ClientAddr {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }
}

impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `ip` is routable on the public internet.
///
/// Private, loopback, link-local, unspecified, shared (CGNAT) and IPv6
/// unique-local addresses are not.
pub fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            let shared = a == 100 && (64..128).contains(&b);
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || shared)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments().first().copied().unwrap_or(0);
            let unique_local = (first & 0xfe00) == 0xfc00;
            let link_local = (first & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}

/// First public address in an `X-Forwarded-For` value.
///
/// Entries that do not parse as addresses are skipped.
pub fn first_public_forwarded(value: &str) -> Option<IpAddr> {
    value
        .split(',')
        .filter_map(|entry| entry.trim().parse::<IpAddr>().ok())
        .find(is_public)
}

fn forwarded_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(forwarded) = req.headers().get(FORWARDED_FOR_HEADER)
        && let Ok(value) = forwarded.to_str()
        && let Some(ip) = first_public_forwarded(value)
    {
        return Some(ip);
    }

    if let Some(real_ip) = req.headers().get(REAL_IP_HEADER)
        && let Ok(value) = real_ip.to_str()
        && let Ok(ip) = value.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }

    None
}

/// Work out the client address for `req`.
pub fn resolve_client_addr<B>(req: &Request<B>, trusted: &TrustedProxyConfig) -> ClientAddr {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let peer_ip = peer.map(|addr| addr.ip());

    if trusted.is_trusted(peer_ip.as_ref())
        && let Some(ip) = forwarded_ip(req)
    {
        let addr = match peer {
            Some(peer) => SocketAddr::new(ip, peer.port()).to_string(),
            None => ip.to_string(),
        };
        return ClientAddr(addr);
    }

    if trusted.is_enabled() && req.headers().contains_key(FORWARDED_FOR_HEADER) {
        debug!(peer = ?peer, "Ignoring X-Forwarded-For from untrusted peer");
    }

    match peer {
        Some(peer) => ClientAddr(peer.to_string()),
        None => ClientAddr::unknown(),
    }
}

// =============================================================================
// Layer
// =============================================================================

/// Inserts a [`ClientAddr`] extension into every request.
#[derive(Clone, Default)]
pub struct ClientIpLayer {
    trusted: Arc<TrustedProxyConfig>,
}

impl ClientIpLayer {
    pub fn new(trusted: Arc<TrustedProxyConfig>) -> Self {
        Self { trusted }
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            trusted: self.trusted.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ClientIpService<S> {
    inner: S,
    trusted: Arc<TrustedProxyConfig>,
}

impl<S> Service<Request<Body>> for ClientIpService<S>
where
    S: Service<Request<Body>, Response = Response<Body>>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let client = resolve_client_addr(&req, &self.trusted);
        req.extensions_mut().insert(client);
        self.inner.call(req)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/")
    }

    fn with_peer(mut req: Request<Body>, peer: &str) -> Request<Body> {
        req.extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn test_cidr_parse_ipv4() {
        let cidr = CidrRange::parse("10.0.0.0/8").unwrap();
        assert_eq!(cidr.prefix_len, 8);
    }

    #[test]
    fn test_cidr_parse_single_ip() {
        let cidr = CidrRange::parse("192.168.1.1").unwrap();
        assert_eq!(cidr.prefix_len, 32);
        let cidr = CidrRange::parse("::1").unwrap();
        assert_eq!(cidr.prefix_len, 128);
    }

    #[test]
    fn test_cidr_parse_invalid() {
        assert!(CidrRange::parse("not-an-ip").is_none());
        assert!(CidrRange::parse("10.0.0.0/33").is_none());
        assert!(CidrRange::parse("10.0.0.0/x").is_none());
    }

    #[test]
    fn test_cidr_contains() {
        let cidr = CidrRange::parse("10.0.0.0/8").unwrap();
        assert!(cidr.contains(&"10.255.0.1".parse().unwrap()));
        assert!(!cidr.contains(&"11.0.0.1".parse().unwrap()));
        assert!(!cidr.contains(&"::1".parse().unwrap()));

        let everything = CidrRange::parse("0.0.0.0/0").unwrap();
        assert!(everything.contains(&"203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_is_public() {
        assert!(is_public(&"203.0.113.50".parse().unwrap()));
        assert!(is_public(&"2001:db8::1".parse().unwrap()));
        assert!(!is_public(&"10.1.2.3".parse().unwrap()));
        assert!(!is_public(&"127.0.0.1".parse().unwrap()));
        assert!(!is_public(&"100.64.0.1".parse().unwrap()));
        assert!(!is_public(&"fd00::1".parse().unwrap()));
        assert!(!is_public(&"::1".parse().unwrap()));
    }

    #[test]
    fn test_first_public_forwarded_skips_private_hops() {
        let ip = first_public_forwarded("10.0.0.1, garbage, 203.0.113.50, 198.51.100.2");
        assert_eq!(ip, Some("203.0.113.50".parse().unwrap()));
    }

    #[test]
    fn test_first_public_forwarded_none() {
        assert_eq!(first_public_forwarded(""), None);
        assert_eq!(first_public_forwarded("192.168.0.1, 127.0.0.1"), None);
    }

    #[test]
    fn test_resolve_uses_forwarded_with_peer_port() {
        let req = request()
            .header("x-forwarded-for", "203.0.113.50, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let req = with_peer(req, "10.0.0.1:51234");

        let addr = resolve_client_addr(&req, &TrustedProxyConfig::default());
        assert_eq!(addr.as_str(), "203.0.113.50:51234");
    }

    #[test]
    fn test_resolve_uses_real_ip() {
        let req = request()
            .header("x-real-ip", "198.51.100.7")
            .body(Body::empty())
            .unwrap();

        let addr = resolve_client_addr(&req, &TrustedProxyConfig::default());
        assert_eq!(addr.as_str(), "198.51.100.7");
    }

    #[test]
    fn test_resolve_ignores_untrusted_peer() {
        let trusted = TrustedProxyConfig::new(&["10.0.0.0/8".to_string()]);
        let req = request()
            .header("x-forwarded-for", "203.0.113.50")
            .body(Body::empty())
            .unwrap();
        let req = with_peer(req, "198.51.100.9:4000");

        let addr = resolve_client_addr(&req, &trusted);
        assert_eq!(addr.as_str(), "198.51.100.9:4000");
    }

    #[test]
    fn test_resolve_trusted_peer() {
        let trusted = TrustedProxyConfig::new(&["10.0.0.0/8".to_string()]);
        let req = request()
            .header("x-forwarded-for", "203.0.113.50")
            .body(Body::empty())
            .unwrap();
        let req = with_peer(req, "10.1.1.1:4000");

        let addr = resolve_client_addr(&req, &trusted);
        assert_eq!(addr.as_str(), "203.0.113.50:4000");
    }

    #[test]
    fn test_resolve_ipv6_forwarded_with_port() {
        let req = request()
            .header("x-forwarded-for", "2001:db8::1")
            .body(Body::empty())
            .unwrap();
        let req = with_peer(req, "127.0.0.1:8000");

        let addr = resolve_client_addr(&req, &TrustedProxyConfig::default());
        assert_eq!(addr.as_str(), "[2001:db8::1]:8000");
    }

    #[test]
    fn test_resolve_unknown() {
        let req = request().body(Body::empty()).unwrap();
        let addr = resolve_client_addr(&req, &TrustedProxyConfig::default());
        assert_eq!(addr, ClientAddr::unknown());
    }

    #[test]
    fn test_invalid_trusted_proxies_are_skipped() {
        let trusted = TrustedProxyConfig::new(&["bogus".to_string()]);
        assert!(!trusted.is_enabled());
    }
}
