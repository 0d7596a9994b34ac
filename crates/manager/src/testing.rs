//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use certkeeper_common::ServerId;
use certkeeper_config::SiteConfig;

use crate::acme::CertificateAuthority;
use crate::challenge::ChallengeBackend;
use crate::errors::CollaboratorError;
use crate::notify::{Delivery, Notifier};
use crate::site::{SharedSite, SiteProbe};
use crate::updater::CertificateUpdater;

/// Ordered record of collaborator calls shared by all fakes of a test.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub struct FakeSite {
    config: SiteConfig,
    domain: String,
    days: AtomicI64,
    valid: bool,
    refreshes: AtomicUsize,
}

impl FakeSite {
    pub fn new(url: &str, days: i64) -> Self {
        let config = SiteConfig::new("web-1", url);
        let domain = config.registrable_domain();
        Self {
            config,
            domain,
            days: AtomicI64::new(days),
            valid: true,
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn with_server(mut self, server: &str) -> Self {
        self.config.server = ServerId::new(server);
        self
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn config_mut(&mut self) -> &mut SiteConfig {
        &mut self.config
    }

    pub fn set_days(&self, days: i64) {
        self.days.store(days, Ordering::SeqCst);
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> SharedSite {
        Arc::new(self)
    }
}

#[async_trait]
impl SiteProbe for FakeSite {
    fn days_left(&self) -> i64 {
        self.days.load(Ordering::SeqCst)
    }

    async fn refresh(&self) -> Result<(), CollaboratorError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_site_valid(&self) -> bool {
        self.valid
    }

    fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

/// `count` sites `s{i}.{domain}` all with `days` remaining.
pub fn sites(domain: &str, count: usize, days: i64) -> Vec<SharedSite> {
    (0..count)
        .map(|i| FakeSite::new(&format!("s{}.{}", i, domain), days).shared())
        .collect()
}

pub struct FakeUpdater {
    pub name: ServerId,
    pub journal: Journal,
    pub fail_deploy: bool,
    pub fail_reload: bool,
}

impl FakeUpdater {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: ServerId::new(name),
            journal: journal.clone(),
            fail_deploy: false,
            fail_reload: false,
        }
    }
}

#[async_trait]
impl CertificateUpdater for FakeUpdater {
    fn name(&self) -> &ServerId {
        &self.name
    }

    async fn deploy_material(&self, site: &dyn SiteProbe) -> Result<(), CollaboratorError> {
        self.journal
            .record(format!("deploy:{}:{}", self.name, site.config().url));
        if self.fail_deploy {
            return Err("permission denied".into());
        }
        Ok(())
    }

    async fn reload_service(&self) -> Result<(), CollaboratorError> {
        self.journal.record(format!("reload:{}", self.name));
        if self.fail_reload {
            return Err("reload command exited with status 1".into());
        }
        Ok(())
    }
}

pub struct FakeNotifier {
    pub name: String,
    pub journal: Journal,
    pub fail_on: Option<String>,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl FakeNotifier {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: journal.clone(),
            fail_on: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, destination: &str) -> Self {
        self.fail_on = Some(destination.to_string());
        self
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_message(
        &self,
        text: &str,
        destination: &str,
    ) -> Result<Delivery, CollaboratorError> {
        if self.fail_on.as_deref() == Some(destination) {
            self.journal
                .record(format!("notify-failed:{}:{}", self.name, destination));
            return Err("connection refused".into());
        }
        self.journal
            .record(format!("notify:{}:{}:{}", self.name, destination, text));
        self.sent
            .lock()
            .push((text.to_string(), destination.to_string()));
        Ok(Delivery::new("fake message sent"))
    }
}

pub struct FakeBackend {
    pub name: String,
    pub zones: Vec<String>,
    pub credentials: std::collections::BTreeMap<String, String>,
}

impl FakeBackend {
    pub fn new(name: &str, zones: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            zones: zones.iter().map(|z| z.to_string()).collect(),
            credentials: Default::default(),
        }
    }
}

#[async_trait]
impl ChallengeBackend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        "fake"
    }

    fn credentials(&self) -> &std::collections::BTreeMap<String, String> {
        &self.credentials
    }

    async fn is_authoritative_for_domain(&self, url: &str) -> bool {
        self.zones
            .iter()
            .any(|zone| url == zone || url.ends_with(&format!(".{}", zone)))
    }
}

pub struct FakeAuthority {
    pub journal: Journal,
    pub fail_configure: bool,
    pub fail_issue: bool,
}

impl FakeAuthority {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_configure: false,
            fail_issue: false,
        }
    }
}

#[async_trait]
impl CertificateAuthority for FakeAuthority {
    async fn set_challenge_backend(
        &self,
        backend: Arc<dyn ChallengeBackend>,
    ) -> Result<(), CollaboratorError> {
        self.journal.record(format!("backend:{}", backend.name()));
        if self.fail_configure {
            return Err("unsupported provider".into());
        }
        Ok(())
    }

    async fn request_certificate(&self, hostname: &str) -> Result<(), CollaboratorError> {
        self.journal.record(format!("issue:{}", hostname));
        if self.fail_issue {
            return Err("too many certificates already issued".into());
        }
        Ok(())
    }
}
