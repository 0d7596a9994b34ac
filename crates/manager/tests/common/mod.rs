//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use certkeeper::notify::Delivery;
use certkeeper::{
    CertificateAuthority, ChallengeBackend, CollaboratorError, Notifier, SharedSite, SiteProbe,
};
use certkeeper_config::SiteConfig;

/// Site with a settable remaining validity
pub struct StubSite {
    config: SiteConfig,
    domain: String,
    days: AtomicI64,
}

impl StubSite {
    pub fn new(url: &str, days: i64) -> Arc<Self> {
        let config = SiteConfig::new("web-1", url);
        Arc::new(Self {
            domain: config.registrable_domain(),
            config,
            days: AtomicI64::new(days),
        })
    }

    pub fn set_days(&self, days: i64) {
        self.days.store(days, Ordering::SeqCst);
    }
}

#[async_trait]
impl SiteProbe for StubSite {
    fn days_left(&self) -> i64 {
        self.days.load(Ordering::SeqCst)
    }

    async fn refresh(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn is_site_valid(&self) -> bool {
        true
    }

    fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

pub fn shared(sites: &[Arc<StubSite>]) -> Vec<SharedSite> {
    sites.iter().map(|s| s.clone() as SharedSite).collect()
}

/// Notifier that records every message per destination
#[derive(Default)]
pub struct RecordingNotifier {
    pub name: String,
    pub messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn sent_to(&self, destination: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, d)| d == destination)
            .map(|(m, _)| m.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_message(
        &self,
        text: &str,
        destination: &str,
    ) -> Result<Delivery, CollaboratorError> {
        self.messages
            .lock()
            .unwrap()
            .push((text.to_string(), destination.to_string()));
        Ok(Delivery::new("recorded"))
    }
}

/// Authority that refuses some hostnames
#[derive(Default)]
pub struct SelectiveAuthority {
    pub refused: Vec<String>,
    pub issued: Mutex<Vec<String>>,
}

impl SelectiveAuthority {
    pub fn refusing(hosts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            refused: hosts.iter().map(|h| h.to_string()).collect(),
            issued: Mutex::new(Vec::new()),
        })
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateAuthority for SelectiveAuthority {
    async fn set_challenge_backend(
        &self,
        _backend: Arc<dyn ChallengeBackend>,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn request_certificate(&self, hostname: &str) -> Result<(), CollaboratorError> {
        if self.refused.iter().any(|h| h == hostname) {
            return Err("rateLimited: too many certificates already issued".into());
        }
        self.issued.lock().unwrap().push(hostname.to_string());
        Ok(())
    }
}

/// Self-signed PEM certificate and key for `names`, expiring in `valid_days`.
pub fn certificate(names: &[&str], valid_days: i64) -> (String, String) {
    use chrono::{Datelike, Duration, Utc};
    use rcgen::{CertificateParams, DnType, KeyPair};

    let mut params =
        CertificateParams::new(names.iter().map(|n| n.to_string()).collect::<Vec<_>>()).unwrap();
    params.distinguished_name.push(DnType::CommonName, names[0]);
    let expiry = (Utc::now() + Duration::days(valid_days)).date_naive();
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(expiry.year(), expiry.month() as u8, expiry.day() as u8);

    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    (cert.pem(), key.serialize_pem())
}

/// Executable lego stand-in copying `$ISSUED_DIR/issued.{crt,key}` into its
/// output directory.
pub fn install_fake_lego(dir: &Path) -> String {
    use std::os::unix::fs::PermissionsExt;

    const SCRIPT: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
    case "$1" in
        --path) P="$2"; shift ;;
        --domains) D="$2"; shift ;;
    esac
    shift
done
mkdir -p "$P/certificates"
cp "$ISSUED_DIR/issued.crt" "$P/certificates/$D.crt"
cp "$ISSUED_DIR/issued.key" "$P/certificates/$D.key"
"#;

    let path = dir.join("lego");
    std::fs::write(&path, SCRIPT).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}
