//! Client IP extraction from HTTP headers with trust validation
//!
//! - Validates trust chains for X-Forwarded-For and Forwarded headers
//! - Supports the Cloudflare CF-Connecting-IP header
//! - Falls back to the socket remote address when headers are untrusted

use axum::http::HeaderMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::warn;

use crate::config::{GeoConfig, TrustedProxyMode};

/// Extract the client IP address according to the trust configuration
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr, config: &GeoConfig) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_standard_ip(headers, config).unwrap_or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Prefer RFC 7239 `Forwarded`, fall back to `X-Forwarded-For`
fn extract_standard_ip(headers: &HeaderMap, config: &GeoConfig) -> Option<IpAddr> {
    let chain = forwarded_chain(headers).or_else(|| x_forwarded_for_chain(headers))?;
    pick_client(&chain, config)
}

/// Parse a `for=` node, stripping quotes, IPv6 brackets and ports
fn parse_forwarded_node(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');

    if let Some(rest) = value.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }

    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.rsplit_once(':')?.0.parse::<Ipv4Addr>().ok().map(IpAddr::V4))
}

/// `Forwarded: for=192.0.2.60;proto=http, for="[2001:db8::1]:4711"`
fn forwarded_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let forwarded = headers.get("forwarded")?.to_str().ok()?;

    let chain: Vec<IpAddr> = forwarded
        .split(',')
        .filter_map(|element| {
            element.split(';').find_map(|param| {
                let (name, value) = param.trim().split_once('=')?;
                name.eq_ignore_ascii_case("for")
                    .then(|| parse_forwarded_node(value))
                    .flatten()
            })
        })
        .collect();

    (!chain.is_empty()).then_some(chain)
}

fn x_forwarded_for_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    let chain: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    (!chain.is_empty()).then_some(chain)
}

/// Walk the chain right to left, skipping hops we trust
fn pick_client(chain: &[IpAddr], config: &GeoConfig) -> Option<IpAddr> {
    if let Some(num_trusted) = config.num_trusted_proxies {
        return if chain.len() > num_trusted {
            Some(chain[chain.len() - num_trusted - 1])
        } else {
            // Not enough hops, return the leftmost (least trusted)
            chain.first().copied()
        };
    }

    if !config.trusted_proxies.is_empty() {
        return chain
            .iter()
            .rev()
            .find(|ip| !config.trusted_proxies.iter().any(|net| net.contains(*ip)))
            .or_else(|| chain.first())
            .copied();
    }

    chain.last().copied()
}

/// Anonymize an IP address by truncating to network prefix
///
/// - IPv4: Truncate to /24 (zero last octet)
/// - IPv6: Truncate to /48 (zero last 80 bits)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], 0))
        }
        IpAddr::V6(addr) => {
            let segments = addr.segments();
            IpAddr::V6(Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                0,
                0,
                0,
                0,
                0,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn create_config(mode: TrustedProxyMode) -> GeoConfig {
        GeoConfig {
            trusted_proxy_mode: mode,
            ..Default::default()
        }
    }

    fn socket() -> IpAddr {
        "192.168.1.1".parse().unwrap()
    }

    #[test]
    fn test_extract_client_ip_none_mode_ignores_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::None);

        assert_eq!(extract_client_ip(&headers, socket(), &config), socket());
    }

    #[test]
    fn test_extract_cloudflare_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::Cloudflare);

        let result = extract_client_ip(&headers, socket(), &config);
        assert_eq!(result, "203.0.113.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_extract_cloudflare_missing_header_falls_back() {
        let config = create_config(TrustedProxyMode::Cloudflare);
        assert_eq!(extract_client_ip(&HeaderMap::new(), socket(), &config), socket());
    }

    #[test]
    fn test_extract_x_forwarded_for_basic() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        let config = create_config(TrustedProxyMode::Standard);

        let result = extract_client_ip(&headers, socket(), &config);
        // Rightmost hop in the absence of trust configuration
        assert_eq!(result, "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_extract_x_forwarded_for_num_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.0.0.2"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.num_trusted_proxies = Some(1);

        let result = extract_client_ip(&headers, socket(), &config);
        assert_eq!(result, "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_extract_x_forwarded_for_trusted_cidrs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.0.0.2, 10.0.0.3"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];

        let result = extract_client_ip(&headers, socket(), &config);
        assert_eq!(result, "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_extract_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "forwarded",
            HeaderValue::from_static("for=192.0.2.60:4711;proto=http, For=\"[2001:db8::1]:8080\""),
        );
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        let config = create_config(TrustedProxyMode::Standard);

        let result = extract_client_ip(&headers, socket(), &config);
        assert_eq!(result, "2001:db8::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_anonymize_ipv4() {
        let ip: IpAddr = "192.168.1.100".parse().unwrap();
        assert_eq!(anonymize_ip(ip), "192.168.1.0".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_anonymize_ipv6() {
        let ip: IpAddr = "2001:db8::1234:5678".parse().unwrap();
        assert_eq!(anonymize_ip(ip), "2001:db8::".parse::<IpAddr>().unwrap());
    }
}
