//! Cycle driver
//!
//! Re-probes every site, rebuilds the domain index and runs one renewal
//! cycle, either once or periodically until shutdown.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::coordinator::{CertManager, CycleReport};
use crate::index::index_sites;
use crate::site::SharedSite;

/// Default time between cycles (12 hours)
const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(12 * 3600);

/// Minimum time between cycles
const MIN_CYCLE_INTERVAL: Duration = Duration::from_secs(60);

/// Drives [`CertManager::parse_sites`] over freshly probed sites.
pub struct RenewalScheduler {
    manager: CertManager,
    sites: Vec<SharedSite>,
    cycle_interval: Duration,
}

impl RenewalScheduler {
    pub fn new(manager: CertManager, sites: Vec<SharedSite>) -> Self {
        Self {
            manager,
            sites,
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
        }
    }

    /// Set the time between cycles, clamped to one minute.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = interval.max(MIN_CYCLE_INTERVAL);
        self
    }

    pub fn cycle_interval(&self) -> Duration {
        self.cycle_interval
    }

    pub fn manager(&self) -> &CertManager {
        &self.manager
    }

    /// Re-probe all sites and hand the new index to the manager.
    ///
    /// A site that fails its probe keeps its previous state and stays
    /// indexed.
    pub async fn refresh_index(&mut self) {
        for site in &self.sites {
            match site.refresh_and_get_days_left().await {
                Ok(days) => debug!(site = %site.config().url, days_left = days, "Refreshed site"),
                Err(e) => warn!(site = %site.config().url, error = %e, "Site refresh failed"),
            }
        }
        self.manager.set_indexed_sites(index_sites(&self.sites));
    }

    /// Run a single cycle.
    pub async fn run_once(&mut self) -> CycleReport {
        let start = Instant::now();
        self.refresh_index().await;
        let report = self.manager.parse_sites().await;
        info!(
            cycle_id = %report.cycle_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "{}",
            report
        );
        report
    }

    /// Run cycles until `shutdown` turns true.
    ///
    /// The first cycle starts immediately. A cycle in progress is finished
    /// before shutdown is observed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            cycle_interval_minutes = self.cycle_interval.as_secs() / 60,
            sites = self.sites.len(),
            "Starting renewal scheduler"
        );

        let mut ticker = interval(self.cycle_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Renewal scheduler stopping");
                        return;
                    }
                }
            }
        }
    }
}
