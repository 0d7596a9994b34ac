//! Deployment over `scp` and `ssh`.
//!
//! Both run non-interactively (`BatchMode=yes`): the identity file or an
//! agent must already grant access as the configured owner.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use certkeeper_common::ServerId;
use certkeeper_config::{RemoteConnection, UpdaterConfig};

use super::CertificateUpdater;
use crate::acme::CertificateStore;
use crate::errors::{CollaboratorError, FactoryError};
use crate::process;
use crate::site::SiteProbe;

#[derive(Debug, Clone)]
pub struct RemoteUpdater {
    config: UpdaterConfig,
    remote: RemoteConnection,
    store: CertificateStore,
}

impl RemoteUpdater {
    pub fn new(config: UpdaterConfig, store: CertificateStore) -> Result<Self, FactoryError> {
        let remote = config.remote.clone().ok_or_else(|| FactoryError::MissingField {
            kind: "updater",
            name: config.name.to_string(),
            field: "remote",
        })?;
        Ok(Self {
            config,
            remote,
            store,
        })
    }

    fn target(&self) -> String {
        match &self.config.owner {
            Some(owner) => format!("{}@{}", owner, self.remote.hostname),
            None => self.remote.hostname.clone(),
        }
    }

    fn common_options(&self, port_flag: &str) -> Vec<String> {
        let mut args = vec![
            port_flag.to_string(),
            self.remote.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(identity) = &self.remote.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }

    /// `scp` arguments copying `source` to `destination` on the remote host
    pub fn scp_args(&self, source: &Path, destination: &Path) -> Vec<String> {
        let mut args = self.common_options("-P");
        args.push(source.display().to_string());
        args.push(format!("{}:{}", self.target(), destination.display()));
        args
    }

    /// `ssh` arguments running `script` on the remote host
    pub fn ssh_args(&self, script: &str) -> Vec<String> {
        let mut args = self.common_options("-p");
        args.push(self.target());
        args.push(script.to_string());
        args
    }

    async fn copy(&self, source: &Path, destination: &Path) -> Result<(), CollaboratorError> {
        if destination.as_os_str().is_empty() {
            return Err(format!("no destination configured for {}", source.display()).into());
        }
        let mut scp = Command::new("scp");
        scp.args(self.scp_args(source, destination));
        process::run(scp, "scp").await?;
        debug!(
            updater = %self.config.name,
            host = %self.remote.hostname,
            destination = %destination.display(),
            "Copied certificate material"
        );
        Ok(())
    }
}

#[async_trait]
impl CertificateUpdater for RemoteUpdater {
    fn name(&self) -> &ServerId {
        &self.config.name
    }

    async fn deploy_material(&self, site: &dyn SiteProbe) -> Result<(), CollaboratorError> {
        let config = site.config();
        let material = self.store.require(config.hostname())?;

        self.copy(&material.certificate, &config.location.certificate)
            .await?;
        self.copy(&material.private_key, &config.location.private_key)
            .await?;

        info!(
            updater = %self.config.name,
            host = %self.remote.hostname,
            site = %config.url,
            "Deployed certificate"
        );
        Ok(())
    }

    async fn reload_service(&self) -> Result<(), CollaboratorError> {
        let Some(reload) = &self.config.reload_command else {
            debug!(updater = %self.config.name, "No reload command configured");
            return Ok(());
        };

        let mut ssh = Command::new("ssh");
        ssh.args(self.ssh_args(reload));
        process::run(ssh, "ssh").await?;

        info!(
            updater = %self.config.name,
            host = %self.remote.hostname,
            "Reloaded service"
        );
        Ok(())
    }
}
