//! Full renewal cycles through the public API

mod common;

use std::sync::Arc;

use certkeeper::challenge::StaticZonesBackend;
use certkeeper::{
    build_collaborators, index_sites, init_multi, CertManager, ChallengeBackend, Notifier,
    RenewalScheduler, RenewalStage, SiteProbe,
};
use certkeeper_common::RateLimits;
use certkeeper_config::{Config, ManagerConfig, RecipientConfig};
use common::{RecordingNotifier, SelectiveAuthority, StubSite};
use tempfile::TempDir;

fn backend(name: &str, zones: &[&str]) -> Arc<dyn ChallengeBackend> {
    Arc::new(StaticZonesBackend::new(
        name,
        "gandiv5",
        zones.iter().map(|z| z.to_string()).collect(),
        Default::default(),
    ))
}

fn recipients() -> ManagerConfig {
    ManagerConfig {
        recipients: vec![
            RecipientConfig::new("chat", &["RENEW"], &["#certificates"]),
            RecipientConfig::new("chat", &["ERROR"], &["#alerts"]),
        ],
        limits: RateLimits::default(),
    }
}

#[tokio::test]
async fn test_cycle_over_several_domains() {
    let mut fleet = Vec::new();
    // example.com: 60 candidates, only the weekly budget fits
    for i in 0..60 {
        fleet.push(StubSite::new(&format!("s{i}.example.com"), 20));
    }
    // example.net: one urgent site, one healthy
    fleet.push(StubSite::new("www.example.net", 2));
    fleet.push(StubSite::new("api.example.net", 70));
    // example.org: no backend
    fleet.push(StubSite::new("www.example.org", 1));

    let notifier = RecordingNotifier::new("Chat");
    let authority = SelectiveAuthority::refusing(&[]);
    let manager = CertManager::new(
        recipients(),
        Vec::new(),
        index_sites(&common::shared(&fleet)),
        vec![notifier.clone() as Arc<dyn Notifier>],
        vec![backend("gandi", &["example.com", "example.net"])],
        authority.clone(),
    );

    let report = manager.parse_sites().await;

    assert_eq!(report.selected.len(), 52);
    assert_eq!(report.renewed.len(), 51);
    assert_eq!(report.backlogged, vec!["example.com"]);
    assert!(report.exclusions.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].url, "www.example.org");
    assert_eq!(report.failures[0].stage, RenewalStage::Pending);

    assert!(authority.issued().contains(&"www.example.net".to_string()));
    assert!(!authority.issued().contains(&"api.example.net".to_string()));
    assert!(!authority.issued().contains(&"s50.example.com".to_string()));

    assert_eq!(notifier.sent_to("#certificates").len(), 51);
    assert_eq!(
        notifier.sent_to("#alerts"),
        vec!["[www.example.org] Error: no DNS challenge backend is authoritative for www.example.org;"]
    );
}

#[tokio::test]
async fn test_backlogged_domain_is_excluded_whole() {
    let mut fleet = Vec::new();
    for i in 0..51 {
        fleet.push(StubSite::new(&format!("s{i}.example.com"), 3));
    }
    fleet.push(StubSite::new("www.example.net", 3));

    let authority = SelectiveAuthority::refusing(&[]);
    let manager = CertManager::new(
        recipients(),
        Vec::new(),
        index_sites(&common::shared(&fleet)),
        Vec::new(),
        vec![backend("gandi", &["example.com", "example.net"])],
        authority.clone(),
    );

    let report = manager.parse_sites().await;

    assert_eq!(report.exclusions.len(), 1);
    assert_eq!(report.exclusions[0].domain, "example.com");
    assert_eq!(report.exclusions[0].urgent, 51);
    assert_eq!(authority.issued(), vec!["www.example.net"]);
}

#[tokio::test]
async fn test_failed_site_is_retried_next_cycle() {
    let site = StubSite::new("www.example.com", 4);
    let notifier = RecordingNotifier::new("chat");
    let refusing = SelectiveAuthority::refusing(&["www.example.com"]);

    let manager = CertManager::new(
        recipients(),
        Vec::new(),
        index_sites(&common::shared(&[site.clone()])),
        vec![notifier.clone() as Arc<dyn Notifier>],
        vec![backend("gandi", &["example.com"])],
        refusing,
    );
    let mut scheduler = RenewalScheduler::new(manager, common::shared(&[site.clone()]));

    let first = scheduler.run_once().await;
    assert_eq!(first.failures[0].stage, RenewalStage::ChallengeConfigured);
    assert!(first.failures[0].error.contains("rateLimited"));

    let second = scheduler.run_once().await;
    assert_eq!(second.selected, vec!["www.example.com"]);
    assert_eq!(notifier.sent_to("#alerts").len(), 2);
    assert_ne!(first.cycle_id, second.cycle_id);
}

#[tokio::test]
async fn test_end_to_end_with_command_authority_and_local_updater() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    // Currently deployed: expires in 5 days
    let deployed_cert = root.join("nginx/www.example.com.crt");
    let deployed_key = root.join("nginx/www.example.com.key");
    std::fs::create_dir_all(root.join("nginx")).unwrap();
    let (old_cert, old_key) = common::certificate(&["www.example.com"], 5);
    std::fs::write(&deployed_cert, old_cert).unwrap();
    std::fs::write(&deployed_key, old_key).unwrap();

    // What the authority will hand out: 90 days
    let issued_dir = root.join("issued");
    std::fs::create_dir_all(&issued_dir).unwrap();
    let (new_cert, new_key) = common::certificate(&["www.example.com"], 90);
    std::fs::write(issued_dir.join("issued.crt"), &new_cert).unwrap();
    std::fs::write(issued_dir.join("issued.key"), &new_key).unwrap();

    let lego = common::install_fake_lego(root);
    let reloaded = root.join("reloaded");

    let config = Config::from_json(
        &serde_json::json!({
            "certificates_root": root.join("store"),
            "manager": {
                "recipients": [
                    { "notifier": "audit", "categories": ["RENEW", "ERROR"], "destinations": ["ops"] }
                ]
            },
            "sites": [{
                "server": "web-1",
                "url": "www.example.com",
                "location": { "certificate": deployed_cert, "private_key": deployed_key }
            }],
            "updaters": [{
                "name": "web-1",
                "type": "local",
                "reload_command": format!("touch {}", reloaded.display())
            }],
            "notifiers": [{ "name": "audit", "type": "log" }],
            "dns_servers": [{
                "name": "gandi",
                "type": "static",
                "provider": "gandiv5",
                "zones": ["example.com"],
                "env": { "ISSUED_DIR": issued_dir }
            }],
            "acme": { "email": "ops@example.com", "command": lego }
        })
        .to_string(),
    )
    .unwrap();
    assert!(config.validate().is_valid());

    let collaborators = build_collaborators(&config).unwrap();
    let store = collaborators.store.clone();
    let sites = init_multi(&config.sites).await;
    assert!(sites[0].days_left() <= 5);

    let manager = CertManager::new(
        config.manager.clone(),
        collaborators.updaters,
        Vec::new(),
        collaborators.notifiers,
        collaborators.backends,
        collaborators.authority,
    );
    let mut scheduler = RenewalScheduler::new(manager, sites.clone());

    let report = scheduler.run_once().await;

    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.renewed, vec!["www.example.com"]);
    assert!(reloaded.exists());
    assert_eq!(std::fs::read_to_string(&deployed_cert).unwrap(), new_cert);
    assert_eq!(std::fs::read_to_string(&deployed_key).unwrap(), new_key);

    let stored = store.load("www.example.com").unwrap().unwrap();
    assert_eq!(stored.meta.unwrap().challenge_backend.as_deref(), Some("gandi"));

    // The next probe sees the new certificate and nothing is selected
    sites[0].refresh().await.unwrap();
    assert!(sites[0].days_left() >= 88);
    let report = scheduler.run_once().await;
    assert!(report.selected.is_empty());
}
