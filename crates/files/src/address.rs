//! Internal address detection for file URLs.
//!
//! Absolute URLs are fetched server side, so hosts that resolve inside the
//! deployment (loopback, private ranges, link-local, cloud metadata) are
//! refused before any request is made. Relative URLs point at the file
//! service itself and are always allowed.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

const LOCAL_HOSTS: &[&str] = &["localhost", "metadata", "metadata.google.internal"];
const LOCAL_SUFFIXES: &[&str] = &[".localhost", ".local", ".internal", ".localdomain"];

/// Whether `url` targets a host inside the deployment network.
///
/// Relative and unparsable URLs are not internal.
pub fn is_internal_address(url: &str) -> bool {
    if url.starts_with('/') {
        return false;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    match parsed.host() {
        Some(Host::Ipv4(ip)) => is_internal_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_internal_ipv6(ip),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if let Ok(ip) = domain.parse::<IpAddr>() {
                return is_internal_ip(ip);
            }
            LOCAL_HOSTS.contains(&domain.as_str())
                || LOCAL_SUFFIXES.iter().any(|s| domain.ends_with(s))
        }
        None => false,
    }
}

pub fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_internal_ipv4(ip),
        IpAddr::V6(ip) => is_internal_ipv6(ip),
    }
}

fn is_internal_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || a == 0
        // Shared address space 100.64.0.0/10
        || (a == 100 && (64..=127).contains(&b))
}

fn is_internal_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_internal_ipv4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // Unique local fc00::/7
        || first & 0xfe00 == 0xfc00
        // Link-local fe80::/10
        || first & 0xffc0 == 0xfe80
}
