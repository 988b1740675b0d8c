//! Client IP extraction.
//!
//! Trusted edge-proxy headers take priority over the raw peer address:
//! `CF-Connecting-IP`, then `X-Real-IP`, then the first `X-Forwarded-For`
//! entry, then the socket address. This ordering is a trust assumption —
//! the headers are spoofable unless every upstream hop is a trusted proxy
//! that overwrites them. Deployments without such a proxy should not
//! expose these headers to clients.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

/// Placeholder when no source address can be determined at all.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Extract the client IP for allowlisting and rate-limit keying.
///
/// Header values must parse as IP literals to be used; malformed values
/// fall through to the next source.
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    for header in ["CF-Connecting-IP", "X-Real-IP"] {
        if let Some(ip) = header_ip(headers, header) {
            return ip;
        }
    }

    if let Some(xff) = headers.get("X-Forwarded-For").and_then(|v| v.to_str().ok()) {
        // X-Forwarded-For chains client, proxy1, proxy2; the first entry
        // is the original client.
        if let Some(first) = xff.split(',').next() {
            let candidate = first.trim();
            if candidate.parse::<IpAddr>().is_ok() {
                return candidate.to_string();
            }
        }
    }

    match peer {
        Some(ConnectInfo(addr)) => addr.ip().to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.parse::<IpAddr>().is_ok() {
        Some(value.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn peer(addr: &str) -> ConnectInfo<SocketAddr> {
        ConnectInfo(addr.parse().unwrap())
    }

    #[test]
    fn cf_connecting_ip_wins() {
        let h = headers(&[
            ("CF-Connecting-IP", "203.0.113.7"),
            ("X-Real-IP", "10.0.0.2"),
            ("X-Forwarded-For", "192.168.1.1"),
        ]);
        assert_eq!(extract_client_ip(&h, Some(&peer("127.0.0.1:80"))), "203.0.113.7");
    }

    #[test]
    fn x_real_ip_beats_forwarded_for() {
        let h = headers(&[
            ("X-Real-IP", "10.0.0.2"),
            ("X-Forwarded-For", "192.168.1.1"),
        ]);
        assert_eq!(extract_client_ip(&h, None), "10.0.0.2");
    }

    #[test]
    fn first_forwarded_for_entry_is_used() {
        let h = headers(&[("X-Forwarded-For", " 192.168.1.100 , 10.0.0.1, 172.16.0.1")]);
        assert_eq!(extract_client_ip(&h, None), "192.168.1.100");
    }

    #[test]
    fn malformed_header_falls_through_to_peer() {
        let h = headers(&[("CF-Connecting-IP", "not-an-ip")]);
        assert_eq!(extract_client_ip(&h, Some(&peer("198.51.100.4:1234"))), "198.51.100.4");
    }

    #[test]
    fn no_source_yields_unknown() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), None), UNKNOWN_CLIENT);
    }

    #[test]
    fn ipv6_literals_are_accepted() {
        let h = headers(&[("X-Forwarded-For", "2001:db8::1")]);
        assert_eq!(extract_client_ip(&h, None), "2001:db8::1");
    }
}
