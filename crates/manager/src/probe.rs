//! Deployed certificate prober.
//!
//! Reads the certificate at a site's configured location and keeps its
//! expiry and subject names. A site whose certificate has not been deployed
//! yet probes as expired, so the next cycle issues one.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::path::Path;
use tracing::{debug, warn};
use x509_parser::extensions::GeneralName;

use certkeeper_config::SiteConfig;

use crate::errors::CollaboratorError;
use crate::site::{SharedSite, SiteProbe};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Default)]
struct ProbeState {
    /// Expiry as a Unix timestamp; `None` when nothing is deployed
    not_after: Option<i64>,
    /// Subject common names and DNS alternative names
    names: Vec<String>,
}

/// Certificate details read from PEM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedCertificate {
    pub not_after: i64,
    pub names: Vec<String>,
}

/// Probes a site through its deployed certificate file.
#[derive(Debug)]
pub struct FileProbe {
    config: SiteConfig,
    domain: String,
    state: RwLock<ProbeState>,
}

impl FileProbe {
    /// Probe `config` once; fails when the deployed file cannot be parsed.
    pub async fn open(config: SiteConfig) -> Result<Self, CollaboratorError> {
        let probe = Self::unprobed(config);
        probe.refresh().await?;
        Ok(probe)
    }

    /// A probe that has not read anything yet and reports zero days.
    pub fn unprobed(config: SiteConfig) -> Self {
        let domain = config.registrable_domain();
        Self {
            config,
            domain,
            state: RwLock::new(ProbeState::default()),
        }
    }

    /// Names the deployed certificate was issued for.
    pub fn names(&self) -> Vec<String> {
        self.state.read().names.clone()
    }
}

#[async_trait]
impl SiteProbe for FileProbe {
    fn days_left(&self) -> i64 {
        match self.state.read().not_after {
            Some(not_after) => (not_after - Utc::now().timestamp()).div_euclid(SECONDS_PER_DAY),
            None => 0,
        }
    }

    async fn refresh(&self) -> Result<(), CollaboratorError> {
        let path = &self.config.location.certificate;
        if path.as_os_str().is_empty() {
            return Err(format!("site {} has no certificate location", self.config.url).into());
        }

        let probed = match read_certificate(path).await {
            Ok(probed) => probed,
            Err(e) if is_not_found(&e) => {
                debug!(site = %self.config.url, path = %path.display(), "No deployed certificate");
                *self.state.write() = ProbeState::default();
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        debug!(
            site = %self.config.url,
            not_after = probed.not_after,
            names = ?probed.names,
            "Probed deployed certificate"
        );
        *self.state.write() = ProbeState {
            not_after: Some(probed.not_after),
            names: probed.names,
        };
        Ok(())
    }

    fn is_site_valid(&self) -> bool {
        let host = self.config.hostname();
        self.state
            .read()
            .names
            .iter()
            .any(|name| name_matches(name, host))
    }

    fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

/// Probe every configured site, skipping those that cannot be probed.
pub async fn init_multi(configs: &[SiteConfig]) -> Vec<SharedSite> {
    let mut sites: Vec<SharedSite> = Vec::with_capacity(configs.len());
    for config in configs {
        let url = config.url.clone();
        match FileProbe::open(config.clone()).await {
            Ok(probe) => sites.push(std::sync::Arc::new(probe)),
            Err(e) => warn!(site = %url, error = %e, "Cannot probe site, skipping"),
        }
    }
    sites
}

/// Parse the first certificate of a PEM file.
pub async fn read_certificate(path: &Path) -> Result<ProbedCertificate, CollaboratorError> {
    let content = tokio::fs::read(path).await?;
    parse_certificate(&content)
}

/// Parse the first certificate of a PEM buffer.
pub fn parse_certificate(content: &[u8]) -> Result<ProbedCertificate, CollaboratorError> {
    let block = pem::parse(content)?;
    let (_, cert) = x509_parser::parse_x509_certificate(block.contents())
        .map_err(|e| format!("invalid certificate: {e}"))?;

    let mut names: Vec<String> = cert
        .subject()
        .iter_common_name()
        .filter_map(|cn| cn.as_str().ok())
        .map(str::to_string)
        .collect();

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                if !names.iter().any(|n| n == dns) {
                    names.push(dns.to_string());
                }
            }
        }
    }

    Ok(ProbedCertificate {
        not_after: cert.validity().not_after.timestamp(),
        names,
    })
}

fn is_not_found(e: &CollaboratorError) -> bool {
    e.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

/// Case-insensitive match with single-label wildcards (`*.example.com`).
fn name_matches(name: &str, host: &str) -> bool {
    let name = name.trim_end_matches('.');
    let host = host.trim_end_matches('.');
    if name.eq_ignore_ascii_case(host) {
        return true;
    }
    match (name.strip_prefix("*."), host.split_once('.')) {
        (Some(suffix), Some((label, rest))) => !label.is_empty() && suffix.eq_ignore_ascii_case(rest),
        _ => false,
    }
}
