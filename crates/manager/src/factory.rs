//! Builds concrete collaborators from configuration.
//!
//! Each entry is built independently; one that cannot be built is logged and
//! left out so the remaining sites keep being renewed.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use certkeeper_config::{
    Config, DnsServerConfig, DnsServerType, NotifierConfig, NotifierType, UpdaterConfig,
    UpdaterType,
};

use crate::acme::{CertificateAuthority, CertificateStore, CommandAuthority};
use crate::challenge::{ChallengeBackend, PowerDnsBackend, StaticZonesBackend};
use crate::errors::FactoryError;
use crate::notify::{LogNotifier, MailNotifier, Notifier, RocketNotifier};
use crate::updater::{CertificateUpdater, LocalUpdater, RemoteUpdater};

/// Timeout applied to webhook and DNS API requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the renewal manager drives.
pub struct Collaborators {
    pub updaters: Vec<Arc<dyn CertificateUpdater>>,
    pub notifiers: Vec<Arc<dyn Notifier>>,
    pub backends: Vec<Arc<dyn ChallengeBackend>>,
    pub authority: Arc<dyn CertificateAuthority>,
    pub store: CertificateStore,
}

pub fn http_client() -> Result<reqwest::Client, FactoryError> {
    Ok(reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("certkeeper/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

pub fn build_updater(
    config: &UpdaterConfig,
    store: &CertificateStore,
) -> Result<Arc<dyn CertificateUpdater>, FactoryError> {
    Ok(match config.kind {
        UpdaterType::Local => Arc::new(LocalUpdater::new(config.clone(), store.clone())),
        UpdaterType::Remote => Arc::new(RemoteUpdater::new(config.clone(), store.clone())?),
    })
}

pub fn build_notifier(
    config: &NotifierConfig,
    client: &reqwest::Client,
) -> Result<Arc<dyn Notifier>, FactoryError> {
    Ok(match config.kind {
        NotifierType::Log => Arc::new(LogNotifier::new(config.name.clone())),
        NotifierType::Rocket => {
            let webhook_url =
                config
                    .webhook_url
                    .clone()
                    .ok_or_else(|| FactoryError::MissingField {
                        kind: "notifier",
                        name: config.name.clone(),
                        field: "webhook-url",
                    })?;
            Arc::new(RocketNotifier::new(
                config.name.clone(),
                webhook_url,
                config.username.clone(),
                client.clone(),
            ))
        }
        NotifierType::Mail => {
            let smtp = config
                .smtp
                .as_ref()
                .ok_or_else(|| FactoryError::MissingField {
                    kind: "notifier",
                    name: config.name.clone(),
                    field: "smtp",
                })?;
            Arc::new(MailNotifier::new(config.name.clone(), smtp)?)
        }
    })
}

pub fn build_backend(
    config: &DnsServerConfig,
    client: &reqwest::Client,
) -> Result<Arc<dyn ChallengeBackend>, FactoryError> {
    let missing = |field| FactoryError::MissingField {
        kind: "dns-server",
        name: config.name.clone(),
        field,
    };

    Ok(match config.kind {
        DnsServerType::Static => {
            let provider = config.provider.clone().ok_or_else(|| missing("provider"))?;
            Arc::new(StaticZonesBackend::new(
                config.name.clone(),
                provider,
                config.zones.clone(),
                config.env.clone(),
            ))
        }
        DnsServerType::Powerdns => {
            let api_url = config.api_url.clone().ok_or_else(|| missing("api-url"))?;
            let api_key = config.api_key.clone().ok_or_else(|| missing("api-key"))?;
            Arc::new(PowerDnsBackend::new(
                config.name.clone(),
                api_url,
                api_key,
                config.server_id.clone(),
                config.env.clone(),
                client.clone(),
            ))
        }
    })
}

/// Build every configured collaborator.
///
/// Only a certificate store that cannot be opened or an HTTP client that
/// cannot be built is fatal.
pub fn build_collaborators(config: &Config) -> Result<Collaborators, FactoryError> {
    let store = CertificateStore::new(&config.certificates_root)?;
    let client = http_client()?;

    let updaters = build_each(&config.updaters, "updater", |c| c.name.as_str(), |c| {
        build_updater(c, &store)
    });
    let notifiers = build_each(&config.notifiers, "notifier", |c| c.name.as_str(), |c| {
        build_notifier(c, &client)
    });
    let backends = build_each(&config.dns_servers, "dns-server", |c| c.name.as_str(), |c| {
        build_backend(c, &client)
    });
    let authority: Arc<dyn CertificateAuthority> =
        Arc::new(CommandAuthority::new(config.acme.clone(), store.clone()));

    info!(
        updaters = updaters.len(),
        notifiers = notifiers.len(),
        dns_servers = backends.len(),
        store = %store.root().display(),
        "Built collaborators"
    );

    Ok(Collaborators {
        updaters,
        notifiers,
        backends,
        authority,
        store,
    })
}

fn build_each<C, T: ?Sized>(
    configs: &[C],
    kind: &str,
    name: impl Fn(&C) -> &str,
    build: impl Fn(&C) -> Result<Arc<T>, FactoryError>,
) -> Vec<Arc<T>> {
    configs
        .iter()
        .filter_map(|config| match build(config) {
            Ok(built) => Some(built),
            Err(e) => {
                error!(kind, name = %name(config), error = %e, "Skipping collaborator");
                None
            }
        })
        .collect()
}
