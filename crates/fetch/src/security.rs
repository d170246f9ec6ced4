use std::net::SocketAddr;
use std::time::Duration;

use toolgate_common::error::ErrorKind;
use toolgate_common::security::{is_blocked_address, validate_scheme_and_literal};

/// Resolves a host and rejects the whole URL if any resolved address is
/// internal. Literal-IP and scheme checks
/// already happened in `toolgate_common::security`; this is the half
/// that needs a network and so only runs here, never in the gateway.
pub async fn validate_for_fetch(
    raw_url: &str,
    allow_insecure: bool,
    dns_timeout: Duration,
) -> Result<url::Url, ErrorKind> {
    let url = validate_scheme_and_literal(raw_url, allow_insecure)?;

    let host = url.host_str().ok_or(ErrorKind::InvalidUrl)?;
    let port = url.port_or_known_default().unwrap_or(443);

    let lookup = tokio::time::timeout(dns_timeout, tokio::net::lookup_host((host, port)))
        .await
        .map_err(|_| ErrorKind::InvalidUrl)?
        .map_err(|_| ErrorKind::InvalidUrl)?;

    let addrs: Vec<SocketAddr> = lookup.collect();
    if addrs.is_empty() {
        return Err(ErrorKind::InvalidUrl);
    }
    if addrs.iter().any(|a| is_blocked_address(a.ip())) {
        return Err(ErrorKind::InternalAddressBlocked);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_resolved_loopback() {
        let result =
            validate_for_fetch("https://localhost/spec.json", false, Duration::from_secs(2))
                .await;
        assert_eq!(result.unwrap_err(), ErrorKind::InternalAddressBlocked);
    }

    #[tokio::test]
    async fn rejects_unresolvable_host() {
        let result = validate_for_fetch(
            "https://this-host-should-not-resolve.invalid/spec.json",
            false,
            Duration::from_secs(2),
        )
        .await;
        assert_eq!(result.unwrap_err(), ErrorKind::InvalidUrl);
    }
}
