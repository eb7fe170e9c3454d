//! Validation of user-supplied target URLs (`?url=` requests).
//!
//! Two gates: the configured domain allow-list (suffix match, empty list
//! accepts any domain), and outside dev mode a private/reserved-address block
//! so the proxy cannot be pointed at internal services.

use crate::config::Config;
use crate::error::ProxyError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Validate a `?url=` target against scheme, allow-list, and SSRF policy.
///
/// Protocol-relative inputs (`//host/…`) are upgraded to `https:` first.
///
/// # Errors
/// [`ProxyError::InvalidRequest`] for unparsable URLs or non-HTTP(S) schemes;
/// [`ProxyError::Forbidden`] for allow-list misses and blocked addresses.
pub fn validate_target_url(raw: &str, config: &Config) -> Result<Url, ProxyError> {
    let raw = raw.trim();
    let upgraded;
    let raw = if raw.starts_with("//") {
        upgraded = format!("https:{raw}");
        &upgraded
    } else {
        raw
    };

    let parsed =
        Url::parse(raw).map_err(|_| ProxyError::InvalidRequest(format!("unparsable URL: {raw}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ProxyError::InvalidRequest(format!(
                "scheme '{scheme}' not allowed"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| ProxyError::InvalidRequest(format!("no host in URL: {raw}")))?;

    if !config.allowed_domains.is_empty() {
        let Host::Domain(domain) = &host else {
            return Err(ProxyError::Forbidden(format!(
                "IP-literal host rejected by allow-list: {raw}"
            )));
        };
        let domain = domain.to_lowercase();
        let allowed = config
            .allowed_domains
            .iter()
            .any(|d| domain.ends_with(&d.to_lowercase()));
        if !allowed {
            return Err(ProxyError::Forbidden(format!("domain not allow-listed: {domain}")));
        }
    }

    // Dev mode skips the address block so local test origins work.
    if !config.is_dev {
        match host {
            Host::Ipv4(ip) if is_blocked_ipv4(ip) => {
                return Err(ProxyError::Forbidden(format!(
                    "private or reserved IPv4 address: {ip}"
                )));
            }
            Host::Ipv6(ip) if is_blocked_ipv6(ip) => {
                return Err(ProxyError::Forbidden(format!(
                    "private or reserved IPv6 address: {ip}"
                )));
            }
            _ => {}
        }
    }

    Ok(parsed)
}

/// Private/reserved IPv4 ranges, including the cloud-metadata link-local block.
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_unspecified() || ip.is_loopback() || ip.is_private() || ip.is_link_local()
}

/// IPv6 loopback, unspecified, link-local (`fe80::/10`), unique-local (`fc00::/7`).
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let s = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        || (s[0] & 0xffc0) == 0xfe80
        || (s[0] & 0xfe00) == 0xfc00
}
