//! Issued certificate storage
//!
//! The ACME client writes freshly issued material here and the updaters
//! read it back when deploying.
//!
//! # Directory Structure
//!
//! ```text
//! certificates-root/
//! └── www.example.com/
//!     ├── www.example.com.crt   # Certificate chain
//!     ├── www.example.com.key   # Private key
//!     └── meta.json             # Issuance metadata
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::error::StorageError;

/// Metadata stored alongside the material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateMeta {
    /// Host the certificate was issued for
    pub host: String,
    /// When the material was stored
    pub issued: DateTime<Utc>,
    /// Challenge backend used for issuance
    #[serde(default)]
    pub challenge_backend: Option<String>,
}

/// Locations of a host's material inside the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialPaths {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

/// A stored certificate with its metadata
#[derive(Debug, Clone)]
pub struct StoredMaterial {
    pub cert_pem: String,
    pub key_pem: String,
    pub meta: Option<CertificateMeta>,
}

/// Filesystem certificate store
///
/// Directories are created with restrictive permissions (0700 on Unix) and
/// private keys are written 0600.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    root: PathBuf,
}

impl CertificateStore {
    /// Open the store at `root`, creating it if needed
    pub fn new(root: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(root)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(root, fs::Permissions::from_mode(0o700))?;
        }

        info!(
            storage_path = %root.display(),
            "Initialized certificate store"
        );

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Store root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_dir(&self, host: &str) -> Result<PathBuf, StorageError> {
        if host.is_empty()
            || host.starts_with('.')
            || host.contains(['/', '\\'])
            || host.contains("..")
        {
            return Err(StorageError::InvalidHost(host.to_string()));
        }
        Ok(self.root.join(host))
    }

    /// Where a host's material lives, whether or not it exists yet
    pub fn paths(&self, host: &str) -> Result<MaterialPaths, StorageError> {
        let dir = self.host_dir(host)?;
        Ok(MaterialPaths {
            certificate: dir.join(format!("{}.crt", host)),
            private_key: dir.join(format!("{}.key", host)),
        })
    }

    /// Paths of a host's material, failing when it was never issued
    pub fn require(&self, host: &str) -> Result<MaterialPaths, StorageError> {
        let paths = self.paths(host)?;
        for path in [&paths.certificate, &paths.private_key] {
            if !path.exists() {
                return Err(StorageError::MissingMaterial {
                    host: host.to_string(),
                    path: path.clone(),
                });
            }
        }
        Ok(paths)
    }

    /// Save material for a host
    pub fn save(
        &self,
        host: &str,
        cert_pem: &str,
        key_pem: &str,
        challenge_backend: Option<&str>,
    ) -> Result<MaterialPaths, StorageError> {
        let dir = self.host_dir(host)?;
        fs::create_dir_all(&dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }

        let paths = self.paths(host)?;

        fs::write(&paths.certificate, cert_pem)?;

        // Write private key with restrictive permissions
        fs::write(&paths.private_key, key_pem)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&paths.private_key, fs::Permissions::from_mode(0o600))?;
        }

        let meta = CertificateMeta {
            host: host.to_string(),
            issued: Utc::now(),
            challenge_backend: challenge_backend.map(str::to_string),
        };
        fs::write(dir.join("meta.json"), serde_json::to_string_pretty(&meta)?)?;

        info!(host = %host, "Saved certificate to store");
        Ok(paths)
    }

    /// Copy material produced elsewhere (e.g. by the ACME tool) into the store
    pub fn import(
        &self,
        host: &str,
        cert_src: &Path,
        key_src: &Path,
        challenge_backend: Option<&str>,
    ) -> Result<MaterialPaths, StorageError> {
        let cert_pem = fs::read_to_string(cert_src)?;
        let key_pem = fs::read_to_string(key_src)?;
        debug!(
            host = %host,
            source = %cert_src.display(),
            "Importing issued certificate"
        );
        self.save(host, &cert_pem, &key_pem, challenge_backend)
    }

    /// Load a host's material
    pub fn load(&self, host: &str) -> Result<Option<StoredMaterial>, StorageError> {
        let paths = self.paths(host)?;

        if !paths.certificate.exists() {
            trace!(host = %host, "No stored certificate found");
            return Ok(None);
        }

        let cert_pem = fs::read_to_string(&paths.certificate)?;
        let key_pem = fs::read_to_string(&paths.private_key)?;

        let meta_path = self.host_dir(host)?.join("meta.json");
        let meta = if meta_path.exists() {
            Some(serde_json::from_str(&fs::read_to_string(&meta_path)?)?)
        } else {
            None
        };

        Ok(Some(StoredMaterial {
            cert_pem,
            key_pem,
            meta,
        }))
    }

    /// List all stored hosts
    pub fn list_hosts(&self) -> Result<Vec<String>, StorageError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut hosts = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                match entry.file_name().to_str() {
                    // Tool working directories
                    Some(name) if name.starts_with('.') => {}
                    Some(name) => hosts.push(name.to_string()),
                    None => {}
                }
            }
        }
        hosts.sort();

        Ok(hosts)
    }

    /// Delete a host's material
    pub fn delete(&self, host: &str) -> Result<(), StorageError> {
        let dir = self.host_dir(host)?;

        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            info!(host = %host, "Deleted stored certificate");
        } else {
            warn!(host = %host, "Certificate to delete not found");
        }

        Ok(())
    }
}
