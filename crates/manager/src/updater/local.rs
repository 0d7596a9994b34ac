use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use certkeeper_common::ServerId;
use certkeeper_config::UpdaterConfig;

use super::CertificateUpdater;
use crate::acme::CertificateStore;
use crate::errors::CollaboratorError;
use crate::process;
use crate::site::SiteProbe;

/// Deploys to paths on this host.
#[derive(Debug, Clone)]
pub struct LocalUpdater {
    config: UpdaterConfig,
    store: CertificateStore,
}

impl LocalUpdater {
    pub fn new(config: UpdaterConfig, store: CertificateStore) -> Self {
        Self { config, store }
    }

    async fn install(&self, source: &Path, destination: &Path) -> Result<(), CollaboratorError> {
        if destination.as_os_str().is_empty() {
            return Err(format!("no destination configured for {}", source.display()).into());
        }
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, destination).await?;
        debug!(
            updater = %self.config.name,
            source = %source.display(),
            destination = %destination.display(),
            "Copied certificate material"
        );
        Ok(())
    }
}

#[async_trait]
impl CertificateUpdater for LocalUpdater {
    fn name(&self) -> &ServerId {
        &self.config.name
    }

    async fn deploy_material(&self, site: &dyn SiteProbe) -> Result<(), CollaboratorError> {
        let config = site.config();
        let material = self.store.require(config.hostname())?;

        self.install(&material.certificate, &config.location.certificate)
            .await?;
        self.install(&material.private_key, &config.location.private_key)
            .await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(
                &config.location.private_key,
                std::fs::Permissions::from_mode(0o600),
            )
            .await?;
        }

        if let Some(owner) = &self.config.owner {
            let mut chown = Command::new("chown");
            chown
                .arg(format!("{owner}:{owner}"))
                .arg(&config.location.certificate)
                .arg(&config.location.private_key);
            process::run(chown, "chown").await?;
        }

        info!(updater = %self.config.name, site = %config.url, "Deployed certificate");
        Ok(())
    }

    async fn reload_service(&self) -> Result<(), CollaboratorError> {
        let Some(reload) = &self.config.reload_command else {
            debug!(updater = %self.config.name, "No reload command configured");
            return Ok(());
        };

        process::run(process::shell(reload), "reload command").await?;
        info!(updater = %self.config.name, "Reloaded service");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSite;
    use certkeeper_config::UpdaterType;
    use tempfile::TempDir;

    fn updater(store: &CertificateStore, reload: Option<&str>) -> LocalUpdater {
        LocalUpdater::new(
            UpdaterConfig {
                name: ServerId::new("web-1"),
                kind: UpdaterType::Local,
                owner: None,
                reload_command: reload.map(str::to_string),
                remote: None,
            },
            store.clone(),
        )
    }

    fn site_in(dir: &TempDir) -> FakeSite {
        let mut site = FakeSite::new("www.example.com", 5);
        site.config_mut().location.certificate = dir.path().join("nginx/tls/www.crt");
        site.config_mut().location.private_key = dir.path().join("nginx/tls/www.key");
        site
    }

    #[tokio::test]
    async fn test_deploys_stored_material() {
        let dir = TempDir::new().unwrap();
        let store = CertificateStore::new(&dir.path().join("store")).unwrap();
        store.save("www.example.com", "CERT", "KEY", None).unwrap();
        let site = site_in(&dir);

        updater(&store, None).deploy_material(&site).await.unwrap();

        let cert = std::fs::read_to_string(dir.path().join("nginx/tls/www.crt")).unwrap();
        let key = std::fs::read_to_string(dir.path().join("nginx/tls/www.key")).unwrap();
        assert_eq!(cert, "CERT");
        assert_eq!(key, "KEY");
    }

    #[tokio::test]
    async fn test_missing_material_fails() {
        let dir = TempDir::new().unwrap();
        let store = CertificateStore::new(&dir.path().join("store")).unwrap();
        let site = site_in(&dir);

        let err = updater(&store, None).deploy_material(&site).await.unwrap_err();
        assert!(err.to_string().contains("no issued material"));
    }

    #[tokio::test]
    async fn test_reload_command() {
        let dir = TempDir::new().unwrap();
        let store = CertificateStore::new(&dir.path().join("store")).unwrap();
        let marker = dir.path().join("reloaded");

        let ok = updater(&store, Some(&format!("touch {}", marker.display())));
        ok.reload_service().await.unwrap();
        assert!(marker.exists());

        let failing = updater(&store, Some("exit 1"));
        assert!(failing.reload_service().await.is_err());

        updater(&store, None).reload_service().await.unwrap();
    }
}
