use crate::error::ProxyError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Check that a decoded target is something the proxy will fetch.
///
/// Only `http://` and `https://` URLs with a host are accepted. When
/// `block_private` is set, IP-literal hosts in loopback, private, link-local
/// or unique-local ranges are refused as well.
///
/// Hostnames are never resolved here, so a public name pointing at a private
/// address still gets through. The guard only covers IP literals.
///
/// # Errors
/// Returns [`ProxyError::BadRequest`] for any refused target.
pub fn validate_target(url: &Url, block_private: bool) -> Result<(), ProxyError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ProxyError::BadRequest(format!(
                "Scheme '{scheme}' not allowed"
            )));
        }
    }

    let host = url
        .host()
        .ok_or_else(|| ProxyError::BadRequest("Target URL has no host".to_string()))?;

    if !block_private {
        return Ok(());
    }

    let blocked = match host {
        Host::Ipv4(ip) => is_blocked_ipv4(ip),
        Host::Ipv6(ip) => is_blocked_ipv6(ip),
        Host::Domain(name) => name.eq_ignore_ascii_case("localhost"),
    };

    if blocked {
        return Err(ProxyError::BadRequest(
            "Target host not allowed".to_string(),
        ));
    }

    Ok(())
}

/// `0.0.0.0/8`, `10.0.0.0/8`, `127.0.0.0/8`, `169.254.0.0/16`,
/// `172.16.0.0/12`, `192.168.0.0/16`
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();

    a == 0
        || a == 10
        || a == 127
        || (a == 169 && b == 254)
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
}

/// `::1`, `fe80::/10`, `fc00::/7`, and IPv4-mapped forms of the v4 ranges
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(v4);
    }

    let s = ip.segments();
    ip.is_loopback() || (s[0] & 0xffc0) == 0xfe80 || (s[0] & 0xfe00) == 0xfc00
}
