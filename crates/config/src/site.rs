//! Managed site configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use certkeeper_common::ServerId;

/// One TLS endpoint under management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Target server; every updater with this name deploys the site
    pub server: ServerId,

    /// Hostname the certificate is issued for
    pub url: String,

    /// TLS port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Registrable domain override (derived from `url` when absent)
    #[serde(default)]
    pub domain: Option<String>,

    /// Where the certificate material is deployed
    #[serde(default)]
    pub location: LocationConfig,
}

/// Deployment locations of a site's certificate material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Certificate chain destination
    #[serde(default)]
    pub certificate: PathBuf,

    /// Private key destination
    #[serde(default)]
    pub private_key: PathBuf,
}

pub(crate) fn default_port() -> u16 {
    443
}

impl SiteConfig {
    /// Create a site on the default port with empty locations.
    pub fn new(server: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            server: ServerId::new(server),
            url: url.into(),
            port: default_port(),
            domain: None,
            location: LocationConfig::default(),
        }
    }

    /// Hostname part of `url` (scheme, port and path stripped).
    pub fn hostname(&self) -> &str {
        let url = self.url.as_str();
        let url = url.split_once("://").map_or(url, |(_, rest)| rest);
        let url = url.split(['/', '?', '#']).next().unwrap_or(url);
        url.split(':').next().unwrap_or(url)
    }

    /// Registrable domain used to group sites for rate limiting.
    ///
    /// An explicit `domain` wins. Otherwise the hostname is looked up in the
    /// public suffix list (private section included, so `foo.github.io` and
    /// `bar.github.io` are distinct). IP addresses, bare public suffixes and
    /// single-label hosts yield an empty domain.
    pub fn registrable_domain(&self) -> String {
        if let Some(domain) = self.domain.as_deref() {
            return domain.trim_end_matches('.').to_ascii_lowercase();
        }

        let host = self.hostname().trim_end_matches('.').to_ascii_lowercase();
        if host.parse::<std::net::IpAddr>().is_ok() || !host.contains('.') {
            return String::new();
        }

        psl::domain_str(&host).map(str::to_string).unwrap_or_default()
    }
}
