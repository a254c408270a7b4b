//! Target validation: normalizes the operator-supplied domain and rejects
//! anything that would point the engine's tool battery at infrastructure it
//! has no business scanning (spec §3: "rejected if it resolves to loopback,
//! RFC1918, or link-local").

use std::net::IpAddr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target is empty after normalization")]
    Empty,

    #[error("target {0:?} is not a well-formed hostname")]
    InvalidHostname(String),

    #[error("target {0:?} resolves to a loopback address; refusing to scan local infrastructure")]
    Loopback(String),

    #[error("target {0:?} resolves to an RFC1918 private address; refusing to scan internal infrastructure")]
    Rfc1918(String),

    #[error("target {0:?} resolves to a link-local address; refusing to scan internal infrastructure")]
    LinkLocal(String),
}

/// A validated, normalized scan target: scheme, path, and surrounding
/// whitespace stripped, lowercased, and shape-checked. Resolution-based
/// checks (loopback/RFC1918/link-local) are applied separately via
/// [`reject_disallowed_ips`] once the caller has resolved the name, since
/// Target construction itself must not perform network I/O.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    fqdn: String,
}

impl Target {
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Parse and normalize a raw `-d/--domain` value: strip a `scheme://`
    /// prefix and any path/query suffix, trim whitespace, lowercase, and
    /// validate the remaining hostname shape.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let trimmed = raw.trim();
        let without_scheme = trimmed.split_once("://").map(|(_, rest)| rest).unwrap_or(trimmed);
        let host_only = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(without_scheme);
        let without_port = host_only.split(':').next().unwrap_or(host_only);
        let fqdn = without_port.trim().trim_end_matches('.').to_ascii_lowercase();

        if fqdn.is_empty() {
            return Err(TargetError::Empty);
        }
        if !is_well_formed_hostname(&fqdn) {
            return Err(TargetError::InvalidHostname(raw.to_string()));
        }

        // A literal IP address passed as `-d` is checked immediately,
        // without needing a DNS round trip.
        if let Ok(ip) = fqdn.parse::<IpAddr>() {
            reject_disallowed_ip(&fqdn, ip)?;
        }

        Ok(Self { fqdn })
    }
}

fn is_well_formed_hostname(fqdn: &str) -> bool {
    if fqdn.len() > 253 {
        return false;
    }
    // An IPv6 literal (contains ':') is validated via IpAddr parsing at the
    // call site instead of the label-based shape check below.
    if fqdn.contains(':') {
        return fqdn.parse::<IpAddr>().is_ok();
    }
    fqdn.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// Reject resolved addresses that point at loopback, RFC1918 private, or
/// link-local space. Called by the engine after resolving `fqdn` (or
/// immediately, for a literal-IP target) — never inside [`Target::parse`]
/// itself, which must stay free of I/O.
pub fn reject_disallowed_ips(fqdn: &str, ips: &[IpAddr]) -> Result<(), TargetError> {
    for ip in ips {
        reject_disallowed_ip(fqdn, *ip)?;
    }
    Ok(())
}

fn reject_disallowed_ip(fqdn: &str, ip: IpAddr) -> Result<(), TargetError> {
    if ip.is_loopback() {
        return Err(TargetError::Loopback(fqdn.to_string()));
    }
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_private() {
                return Err(TargetError::Rfc1918(fqdn.to_string()));
            }
            if v4.is_link_local() {
                return Err(TargetError::LinkLocal(fqdn.to_string()));
            }
        }
        IpAddr::V6(v6) => {
            // fc00::/7 (unique local) is IPv6's RFC1918 analogue.
            if (v6.segments()[0] & 0xfe00) == 0xfc00 {
                return Err(TargetError::Rfc1918(fqdn.to_string()));
            }
            if v6.is_unicast_link_local() {
                return Err(TargetError::LinkLocal(fqdn.to_string()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_path_and_whitespace_and_lowercases() {
        let target = Target::parse("  HTTPS://Example.COM/some/path?x=1  ").unwrap();
        assert_eq!(target.fqdn(), "example.com");
    }

    #[test]
    fn strips_trailing_dot_and_port() {
        let target = Target::parse("example.com.:8443").unwrap();
        assert_eq!(target.fqdn(), "example.com");
    }

    #[test]
    fn rejects_empty_target() {
        assert_eq!(Target::parse("   "), Err(TargetError::Empty));
    }

    #[test]
    fn rejects_malformed_hostname() {
        assert!(matches!(Target::parse("not a host!!"), Err(TargetError::InvalidHostname(_))));
    }

    #[test]
    fn rejects_literal_loopback_ip() {
        assert_eq!(Target::parse("127.0.0.1"), Err(TargetError::Loopback("127.0.0.1".into())));
    }

    #[test]
    fn rejects_literal_rfc1918_ip() {
        assert_eq!(Target::parse("10.0.0.5"), Err(TargetError::Rfc1918("10.0.0.5".into())));
    }

    #[test]
    fn rejects_literal_link_local_ip() {
        assert_eq!(Target::parse("169.254.1.1"), Err(TargetError::LinkLocal("169.254.1.1".into())));
    }

    #[test]
    fn accepts_plain_public_fqdn() {
        let target = Target::parse("example.com").unwrap();
        assert_eq!(target.fqdn(), "example.com");
    }

    #[test]
    fn reject_disallowed_ips_covers_resolved_addresses() {
        let ips: Vec<IpAddr> = vec!["192.168.1.1".parse().unwrap()];
        let err = reject_disallowed_ips("internal.example.com", &ips).unwrap_err();
        assert_eq!(err, TargetError::Rfc1918("internal.example.com".into()));
    }
}
