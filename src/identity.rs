//! Identifier resolution: deriving the rate limit partition key.

use http::HeaderMap;
use std::net::IpAddr;

use crate::guard::RequestContext;

/// A stable partition key for rate limiting, `user:<subject>` or
/// `ip:<address>`. Computed fresh per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Key an authenticated subject. Survives IP changes and shared-IP
    /// scenarios like corporate NAT.
    pub fn from_subject(subject: &str) -> Self {
        Self(format!("user:{}", subject))
    }

    /// Key a client network address.
    pub fn from_ip(ip: impl std::fmt::Display) -> Self {
        Self(format!("ip:{}", ip))
    }

    /// Sentinel for requests with no derivable address. All such callers
    /// share one bucket; a missing identifier never fails the request path.
    pub fn unknown() -> Self {
        Self("ip:unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve the partition key for a request. Infallible by design.
///
/// Preference order: authenticated subject, then the best available client
/// address, then the shared sentinel.
pub fn resolve(request: &RequestContext<'_>) -> Identifier {
    if let Some(subject) = request.subject {
        return Identifier::from_subject(subject);
    }

    match client_ip(request.headers, request.peer_addr) {
        Some(ip) => Identifier::from_ip(ip),
        None => Identifier::unknown(),
    }
}

/// Best available client address: leftmost `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the peer socket address. Proxy headers can be forged
/// when no trusted proxy sets them; that trust decision belongs to the
/// deployment, not this layer.
fn client_ip(headers: &HeaderMap, peer_addr: Option<IpAddr>) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return Some(real_ip.to_string());
        }
    }

    peer_addr.map(|addr| addr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn context<'a>(
        headers: &'a HeaderMap,
        peer_addr: Option<IpAddr>,
        subject: Option<&'a str>,
    ) -> RequestContext<'a> {
        RequestContext {
            method: &Method::POST,
            headers,
            peer_addr,
            subject,
        }
    }

    #[test]
    fn test_subject_takes_precedence_over_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.5".parse().unwrap());
        let ctx = context(&headers, Some("10.0.0.1".parse().unwrap()), Some("u-42"));

        assert_eq!(resolve(&ctx).as_str(), "user:u-42");
    }

    #[test]
    fn test_forwarded_for_uses_leftmost_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.5, 10.0.0.1, 10.0.0.2".parse().unwrap(),
        );
        let ctx = context(&headers, None, None);

        assert_eq!(resolve(&ctx).as_str(), "ip:203.0.113.5");
    }

    #[test]
    fn test_real_ip_header_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.7".parse().unwrap());
        let ctx = context(&headers, None, None);

        assert_eq!(resolve(&ctx).as_str(), "ip:198.51.100.7");
    }

    #[test]
    fn test_peer_address_fallback() {
        let headers = HeaderMap::new();
        let ctx = context(&headers, Some("192.0.2.9".parse().unwrap()), None);

        assert_eq!(resolve(&ctx).as_str(), "ip:192.0.2.9");
    }

    #[test]
    fn test_sentinel_when_nothing_derivable() {
        let headers = HeaderMap::new();
        let ctx = context(&headers, None, None);

        assert_eq!(resolve(&ctx).as_str(), "ip:unknown");
    }

    #[test]
    fn test_empty_forwarded_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "".parse().unwrap());
        let ctx = context(&headers, Some("192.0.2.9".parse().unwrap()), None);

        assert_eq!(resolve(&ctx).as_str(), "ip:192.0.2.9");
    }
}
