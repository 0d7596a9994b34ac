//! Renewal session and per-site state machine.
//!
//! [`CertManager`] holds what one cycle needs: the current domain index,
//! the configured collaborators and the recipient rules. A renewal walks
//! the steps of [`RenewalStage`] in order and stops at the first failure;
//! steps already done are not undone.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use certkeeper_common::CycleId;
use certkeeper_config::ManagerConfig;

use crate::acme::CertificateAuthority;
use crate::challenge::ChallengeBackend;
use crate::errors::{RenewalError, RenewalResult, RenewalStage};
use crate::index::DomainGroup;
use crate::notify::{NotificationRouter, Notifier, Outcome};
use crate::policy::{Exclusion, RateLimitPolicy, Selection};
use crate::site::{SharedSite, SiteProbe};
use crate::updater::CertificateUpdater;

/// A site whose renewal failed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteFailure {
    pub url: String,
    pub error: String,
    /// Step the renewal was attempting
    pub stage: RenewalStage,
}

/// What one pass of [`CertManager::parse_sites`] did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub started_at: DateTime<Utc>,
    /// URLs picked by admission control
    pub selected: Vec<String>,
    pub exclusions: Vec<Exclusion>,
    pub backlogged: Vec<String>,
    pub renewed: Vec<String>,
    pub failures: Vec<SiteFailure>,
    /// Error notifications that could not be delivered
    pub undelivered_alerts: usize,
}

impl CycleReport {
    fn new(cycle_id: CycleId) -> Self {
        Self {
            cycle_id,
            started_at: Utc::now(),
            selected: Vec::new(),
            exclusions: Vec::new(),
            backlogged: Vec::new(),
            renewed: Vec::new(),
            failures: Vec::new(),
            undelivered_alerts: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.undelivered_alerts == 0
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {}: {} selected, {} renewed, {} failed, {} domain(s) excluded",
            self.cycle_id,
            self.selected.len(),
            self.renewed.len(),
            self.failures.len(),
            self.exclusions.len()
        )
    }
}

/// Renewal session shared by the policy, the state machine and the router.
pub struct CertManager {
    policy: RateLimitPolicy,
    router: NotificationRouter,
    updaters: Vec<Arc<dyn CertificateUpdater>>,
    backends: Vec<Arc<dyn ChallengeBackend>>,
    authority: Arc<dyn CertificateAuthority>,
    groups: Vec<DomainGroup>,
}

impl CertManager {
    pub fn new(
        config: ManagerConfig,
        updaters: Vec<Arc<dyn CertificateUpdater>>,
        groups: Vec<DomainGroup>,
        notifiers: Vec<Arc<dyn Notifier>>,
        backends: Vec<Arc<dyn ChallengeBackend>>,
        authority: Arc<dyn CertificateAuthority>,
    ) -> Self {
        Self {
            policy: RateLimitPolicy::new(config.limits),
            router: NotificationRouter::new(config.recipients, notifiers),
            updaters,
            backends,
            authority,
            groups,
        }
    }

    /// Replace the domain index before the next cycle.
    pub fn set_indexed_sites(&mut self, groups: Vec<DomainGroup>) {
        self.groups = groups;
    }

    pub fn indexed_sites(&self) -> &[DomainGroup] {
        &self.groups
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn router(&self) -> &NotificationRouter {
        &self.router
    }

    /// Indexed site with the given URL.
    pub fn find_site(&self, url: &str) -> Option<SharedSite> {
        self.groups
            .iter()
            .flat_map(|group| group.sites.iter())
            .find(|site| site.config().url == url)
            .cloned()
    }

    /// Sites admission control allows this cycle.
    pub fn sites_to_renew(&self) -> Selection {
        self.policy.sites_to_renew(&self.groups)
    }

    /// First backend, in configuration order, authoritative for `url`.
    pub async fn challenge_backend_for(&self, url: &str) -> Option<Arc<dyn ChallengeBackend>> {
        for backend in &self.backends {
            if backend.is_authoritative_for_domain(url).await {
                return Some(backend.clone());
            }
        }
        None
    }

    /// Issue, deploy and reload a certificate for `site`, then announce it.
    pub async fn renew(&self, site: &dyn SiteProbe) -> RenewalResult<()> {
        let span = info_span!("renew", site = %site.config().url);
        self.run_renewal(site).instrument(span).await
    }

    async fn run_renewal(&self, site: &dyn SiteProbe) -> RenewalResult<()> {
        let config = site.config();
        let url = config.url.as_str();

        let backend =
            self.challenge_backend_for(url)
                .await
                .ok_or_else(|| RenewalError::NoChallengeBackend {
                    url: url.to_string(),
                })?;
        debug!(
            stage = %RenewalStage::ChallengeBackendResolved,
            backend = %backend.name(),
            "Resolved challenge backend"
        );

        self.authority
            .set_challenge_backend(backend.clone())
            .await
            .map_err(|source| RenewalError::ChallengeConfiguration {
                backend: backend.name().to_string(),
                source,
            })?;
        debug!(stage = %RenewalStage::ChallengeConfigured, "Configured challenge");

        let hostname = config.hostname();
        self.authority
            .request_certificate(hostname)
            .await
            .map_err(|source| RenewalError::Issuance {
                hostname: hostname.to_string(),
                source,
            })?;
        debug!(stage = %RenewalStage::CertificateIssued, "Certificate issued");

        let mut deployed = 0;
        for updater in self.updaters.iter().filter(|u| *u.name() == config.server) {
            updater
                .deploy_material(site)
                .await
                .map_err(|source| RenewalError::Deployment {
                    updater: updater.name().to_string(),
                    source,
                })?;
            debug!(stage = %RenewalStage::Deployed, updater = %updater.name(), "Deployed");

            updater
                .reload_service()
                .await
                .map_err(|source| RenewalError::Reload {
                    updater: updater.name().to_string(),
                    source,
                })?;
            debug!(stage = %RenewalStage::Reloaded, updater = %updater.name(), "Reloaded");
            deployed += 1;
        }
        if deployed == 0 {
            warn!(server = %config.server, "No updater deploys to this server; material stays in the store");
        }

        self.router.route(&Outcome::renewed(url)).await?;
        debug!(stage = %RenewalStage::Notified, "Renewal announced");

        info!(updaters = deployed, "Certificate renewed");
        Ok(())
    }

    /// Renew `site` regardless of admission control and announce it as forced.
    ///
    /// Recipients hear about it twice: once for the renewal, once for the
    /// forced run.
    pub async fn force_renew_for_site(&self, site: &dyn SiteProbe) -> RenewalResult<()> {
        self.renew(site).await?;
        self.router
            .route(&Outcome::forced(&site.config().url))
            .await?;
        Ok(())
    }

    /// Run one cycle: select, then renew each selected site in order.
    ///
    /// A failing site is reported to the `ERROR` recipients and skipped.
    pub async fn parse_sites(&self) -> CycleReport {
        let cycle_id = CycleId::new();
        let span = info_span!("renewal_cycle", cycle_id = %cycle_id);
        self.run_cycle(cycle_id).instrument(span).await
    }

    async fn run_cycle(&self, cycle_id: CycleId) -> CycleReport {
        let mut report = CycleReport::new(cycle_id);

        let selection = self.sites_to_renew();
        report.selected = selection.urls().into_iter().map(str::to_string).collect();
        report.backlogged = selection.backlogged.clone();
        report.exclusions = selection.exclusions.clone();

        info!(
            domains = self.groups.len(),
            selected = selection.len(),
            excluded = selection.exclusions.len(),
            "Starting renewal cycle"
        );

        for site in &selection.sites {
            let url = site.config().url.clone();
            match self.renew(site.as_ref()).await {
                Ok(()) => report.renewed.push(url),
                Err(e) => {
                    error!(site = %url, stage = %e.stage(), error = %e, "Renewal failed");
                    if let Err(notify_err) = self.router.route(&Outcome::failed(&url, &e)).await {
                        error!(site = %url, error = %notify_err, "Could not deliver failure notification");
                        report.undelivered_alerts += 1;
                    }
                    report.failures.push(SiteFailure {
                        url,
                        error: e.to_string(),
                        stage: e.stage(),
                    });
                }
            }
        }

        info!(
            renewed = report.renewed.len(),
            failed = report.failures.len(),
            "Renewal cycle finished"
        );
        report
    }
}

impl fmt::Debug for CertManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertManager")
            .field("policy", &self.policy)
            .field("recipients", &self.router.rules().len())
            .field("notifiers", &self.router.notifier_count())
            .field("updaters", &self.updaters.len())
            .field("backends", &self.backends.len())
            .field("groups", &self.groups)
            .finish()
    }
}
