//! DNS-01 challenge backends.
//!
//! A backend answers whether it is authoritative for a site and carries the
//! provider code and credentials the certificate authority client needs to
//! publish challenge records. The first configured backend that claims a
//! site handles it.

use async_trait::async_trait;
use std::collections::BTreeMap;

mod fixed;
mod powerdns;

pub use fixed::StaticZonesBackend;
pub use powerdns::PowerDnsBackend;

/// A DNS server able to publish DNS-01 challenge records.
#[async_trait]
pub trait ChallengeBackend: Send + Sync {
    /// Configured name
    fn name(&self) -> &str;

    /// Provider code understood by the ACME client (e.g. `gandiv5`, `pdns`)
    fn provider(&self) -> &str;

    /// Environment the ACME client needs to talk to the provider
    fn credentials(&self) -> &BTreeMap<String, String>;

    /// Whether this server hosts the zone of `url`
    async fn is_authoritative_for_domain(&self, url: &str) -> bool;
}

/// Host part of a site URL, lowercased and without a trailing dot.
pub(crate) fn host_of(url: &str) -> String {
    let url = url.split_once("://").map_or(url, |(_, rest)| rest);
    let url = url.split(['/', '?', '#']).next().unwrap_or(url);
    let host = url.split(':').next().unwrap_or(url);
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Whether `host` is `zone` or lies below it.
pub(crate) fn zone_covers(zone: &str, host: &str) -> bool {
    let zone = zone.trim_end_matches('.').to_ascii_lowercase();
    !zone.is_empty() && (host == zone || host.ends_with(&format!(".{}", zone)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://WWW.Example.com:8443/x"), "www.example.com");
        assert_eq!(host_of("example.com."), "example.com");
    }

    #[test]
    fn test_zone_covers() {
        assert!(zone_covers("example.com.", "example.com"));
        assert!(zone_covers("example.com", "a.b.example.com"));
        assert!(!zone_covers("example.com", "notexample.com"));
        assert!(!zone_covers("", "example.com"));
    }
}
