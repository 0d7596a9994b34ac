//! External ACME tool driver.
//!
//! Runs a lego-compatible executable:
//!
//! ```text
//! lego --accept-tos --email <email> --dns <provider> --domains <host> \
//!      --path <root>/.acme [--server <directory>] [--key-type <type>] run
//! ```
//!
//! with the challenge backend's credentials in the environment, then imports
//! `<root>/.acme/certificates/<host>.{crt,key}` into the store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use certkeeper_config::AcmeConfig;

use super::{CertificateAuthority, CertificateStore};
use crate::challenge::ChallengeBackend;
use crate::errors::CollaboratorError;
use crate::process;

/// Working directory of the tool, inside the store root
const WORK_DIR: &str = ".acme";

pub struct CommandAuthority {
    acme: AcmeConfig,
    store: CertificateStore,
    work_dir: PathBuf,
    backend: Mutex<Option<Arc<dyn ChallengeBackend>>>,
}

impl CommandAuthority {
    pub fn new(acme: AcmeConfig, store: CertificateStore) -> Self {
        let work_dir = store.root().join(WORK_DIR);
        Self {
            acme,
            store,
            work_dir,
            backend: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    /// Arguments for issuing `host` through `provider`
    pub fn command_args(&self, host: &str, provider: &str) -> Vec<String> {
        let mut args = vec![
            "--accept-tos".to_string(),
            "--email".to_string(),
            self.acme.email.clone(),
            "--dns".to_string(),
            provider.to_string(),
            "--domains".to_string(),
            host.to_string(),
            "--path".to_string(),
            self.work_dir.display().to_string(),
        ];
        if let Some(directory) = self.acme.directory() {
            args.push("--server".to_string());
            args.push(directory.to_string());
        }
        if let Some(key_type) = &self.acme.key_type {
            args.push("--key-type".to_string());
            args.push(key_type.clone());
        }
        args.push("run".to_string());
        args
    }
}

#[async_trait]
impl CertificateAuthority for CommandAuthority {
    async fn set_challenge_backend(
        &self,
        backend: Arc<dyn ChallengeBackend>,
    ) -> Result<(), CollaboratorError> {
        if backend.provider().is_empty() {
            return Err(format!("challenge backend '{}' has no provider", backend.name()).into());
        }
        debug!(
            backend = %backend.name(),
            provider = %backend.provider(),
            "Configured DNS challenge backend"
        );
        *self.backend.lock() = Some(backend);
        Ok(())
    }

    async fn request_certificate(&self, hostname: &str) -> Result<(), CollaboratorError> {
        let backend = self
            .backend
            .lock()
            .clone()
            .ok_or("no challenge backend configured")?;

        // Fail on bad host names before running the tool
        self.store.paths(hostname)?;

        let mut command = Command::new(&self.acme.command);
        command
            .args(self.command_args(hostname, backend.provider()))
            .envs(backend.credentials());

        info!(
            host = %hostname,
            backend = %backend.name(),
            "Requesting certificate from the authority"
        );
        process::run(command, &self.acme.command).await?;

        let issued = self.work_dir.join("certificates");
        self.store.import(
            hostname,
            &issued.join(format!("{}.crt", hostname)),
            &issued.join(format!("{}.key", hostname)),
            Some(backend.name()),
        )?;

        Ok(())
    }
}

impl std::fmt::Debug for CommandAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandAuthority")
            .field("command", &self.acme.command)
            .field("store", &self.store.root())
            .field(
                "backend",
                &self.backend.lock().as_ref().map(|b| b.name().to_string()),
            )
            .finish()
    }
}
