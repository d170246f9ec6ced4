//! The Security Gate's pure checks: scheme validation and
//! literal-IP blocking. These run with no I/O so both `toolgate-fetch` and
//! `toolgate-gateway` apply identical rules, and so they're cheap to unit
//! test exhaustively. The DNS-resolution half of the gate (which needs an
//! async runtime) lives in `toolgate-fetch::security`.

use std::net::IpAddr;
use url::Url;

use crate::error::ErrorKind;

/// Parse and validate a base URL's scheme and, if the host is a literal IP,
/// its address range. Does not touch the network — a hostname that isn't a
/// literal IP is accepted here and must still be DNS-checked by the caller.
pub fn validate_scheme_and_literal(raw_url: &str, allow_insecure: bool) -> Result<Url, ErrorKind> {
    let url = Url::parse(raw_url).map_err(|_| ErrorKind::InvalidUrl)?;

    match url.scheme() {
        "https" => {}
        "http" if allow_insecure => {}
        _ => return Err(ErrorKind::InsecureScheme),
    }

    if url.host_str().is_none() {
        return Err(ErrorKind::InvalidUrl);
    }

    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            if is_blocked_address(ip) {
                return Err(ErrorKind::InternalAddressBlocked);
            }
        }
    }

    Ok(url)
}

/// Whether `addr` falls in a loopback, private, or link-local range that
/// must never be reachable from discovery or execution egress, unless
/// the caller has explicitly allow-listed it.
pub fn is_blocked_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || is_carrier_grade_nat(v4)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || is_unique_local_v6(v6)
                || is_link_local_v6(v6)
                || v6.to_ipv4_mapped().is_some_and(is_blocked_v4_in_v6)
        }
    }
}

fn is_blocked_v4_in_v6(v4: std::net::Ipv4Addr) -> bool {
    v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
}

/// 100.64.0.0/10 — carrier-grade NAT space, not covered by `is_private`.
fn is_carrier_grade_nat(v4: std::net::Ipv4Addr) -> bool {
    let octets = v4.octets();
    octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000
}

/// fc00::/7 — unique local addresses.
fn is_unique_local_v6(v6: std::net::Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xfe00) == 0xfc00
}

/// fe80::/10 — link-local addresses.
fn is_link_local_v6(v6: std::net::Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_https_by_default() {
        assert_eq!(
            validate_scheme_and_literal("http://example.com", false),
            Err(ErrorKind::InsecureScheme)
        );
    }

    #[test]
    fn allows_http_when_flag_set() {
        assert!(validate_scheme_and_literal("http://example.com", true).is_ok());
    }

    #[test]
    fn rejects_malformed_url() {
        assert_eq!(
            validate_scheme_and_literal("not a url", false),
            Err(ErrorKind::InvalidUrl)
        );
    }

    #[test]
    fn blocks_literal_loopback() {
        assert_eq!(
            validate_scheme_and_literal("https://127.0.0.1/", false),
            Err(ErrorKind::InternalAddressBlocked)
        );
    }

    #[test]
    fn blocks_literal_private_range() {
        assert_eq!(
            validate_scheme_and_literal("https://10.0.0.5/", false),
            Err(ErrorKind::InternalAddressBlocked)
        );
        assert_eq!(
            validate_scheme_and_literal("https://192.168.1.1/", false),
            Err(ErrorKind::InternalAddressBlocked)
        );
    }

    #[test]
    fn blocks_carrier_grade_nat() {
        assert!(is_blocked_address("100.64.0.1".parse().unwrap()));
        assert!(!is_blocked_address("100.128.0.1".parse().unwrap()));
    }

    #[test]
    fn allows_public_address() {
        assert_eq!(
            validate_scheme_and_literal("https://api.github.com/", false),
            Ok(Url::parse("https://api.github.com/").unwrap())
        );
    }

    #[test]
    fn blocks_link_local_v6() {
        assert!(is_blocked_address("fe80::1".parse().unwrap()));
    }

    #[test]
    fn blocks_unique_local_v6() {
        assert!(is_blocked_address("fd00::1".parse().unwrap()));
    }
}
