//! Configuration loading and validation for certkeeper.
//!
//! A configuration describes the managed sites, the collaborators that
//! renew and deploy their certificates, and the recipient rules that decide
//! who hears about outcomes. It is read once at startup.
//!
//! # Formats
//!
//! KDL is the primary format; TOML and JSON are accepted as well. The format
//! is chosen by file extension, and [`Config::from_dir`] looks for
//! `config.kdl`, `config.toml` and `config.json` in that order.
//!
//! ```kdl
//! certificates-root "/var/lib/certkeeper"
//! loop-restart-minutes 720
//!
//! manager {
//!     recipient "rocket" {
//!         categories "RENEW" "ERROR"
//!         destinations "#certificates"
//!     }
//! }
//!
//! site "www.example.com" {
//!     server "web-1"
//!     certificate "/etc/nginx/tls/www.example.com.crt"
//!     private-key "/etc/nginx/tls/www.example.com.key"
//! }
//!
//! updater "web-1" {
//!     type "local"
//!     owner "www-data"
//!     reload-command "systemctl reload nginx"
//! }
//!
//! notifier "rocket" {
//!     type "rocket"
//!     webhook-url "https://chat.example.com/hooks/token"
//! }
//!
//! dns-server "gandi" {
//!     type "static"
//!     provider "gandiv5"
//!     zones "example.com"
//! }
//!
//! acme {
//!     email "ops@example.com"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub mod error;
pub mod kdl;
pub mod manager;
pub mod services;
pub mod site;
pub mod validate;

pub use error::ConfigError;
pub use manager::{ManagerConfig, RecipientConfig};
pub use services::{
    AcmeConfig, DnsServerConfig, DnsServerType, NotifierConfig, NotifierType, RemoteConnection,
    SmtpConfig, SmtpTls, UpdaterConfig, UpdaterType,
};
pub use site::{LocationConfig, SiteConfig};
pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// File names probed by [`Config::from_dir`], in order.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["config.kdl", "config.toml", "config.json"];

/// Default configuration directory.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/certkeeper/";

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Recipient rules and rate limits
    #[serde(default, alias = "certificate_manager")]
    pub manager: ManagerConfig,

    /// Sites to keep renewed
    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    /// Certificate deployers
    #[serde(default)]
    pub updaters: Vec<UpdaterConfig>,

    /// Notification channels
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,

    /// DNS-01 challenge servers
    #[serde(default)]
    pub dns_servers: Vec<DnsServerConfig>,

    /// External ACME tool
    #[serde(default, alias = "lets_encrypt_user")]
    pub acme: AcmeConfig,

    /// Where issued material is stored before deployment
    #[serde(default = "default_certificates_root", alias = "certificates_root_path")]
    pub certificates_root: PathBuf,

    /// Minutes between cycles in daemon mode
    #[serde(default = "default_loop_restart_minutes", alias = "loop_restart_min")]
    pub loop_restart_minutes: u64,
}

pub(crate) fn default_certificates_root() -> PathBuf {
    PathBuf::from("/var/lib/certkeeper")
}

pub(crate) fn default_loop_restart_minutes() -> u64 {
    720
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            sites: Vec::new(),
            updaters: Vec::new(),
            notifiers: Vec::new(),
            dns_servers: Vec::new(),
            acme: AcmeConfig::default(),
            certificates_root: default_certificates_root(),
            loop_restart_minutes: default_loop_restart_minutes(),
        }
    }
}

impl Config {
    /// Load the first `config.{kdl,toml,json}` found in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let path = CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))?;

        debug!(path = %path.display(), "Found configuration file");
        Self::from_file(path)
    }

    /// Load a configuration file, picking the parser from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("kdl") => Self::from_kdl(&content)?,
            Some("toml") => Self::from_toml(&content)?,
            Some("json") => Self::from_json(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        info!(
            path = %path.display(),
            sites = config.sites.len(),
            updaters = config.updaters.len(),
            notifiers = config.notifiers.len(),
            dns_servers = config.dns_servers.len(),
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Parse KDL text.
    pub fn from_kdl(content: &str) -> Result<Self, ConfigError> {
        let doc: ::kdl::KdlDocument = content.parse()?;
        crate::kdl::parse_document(&doc).map_err(|e| ConfigError::Kdl(format!("{e:#}")))
    }

    /// Parse TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse JSON text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Run the offline checks: cross references and lints.
    pub fn validate(&self) -> ValidationResult {
        let mut result = validate::validate_references(self);
        result.merge(validate::lint_config(self));
        result
    }

    /// Like [`Config::validate`], failing on the first error set.
    pub fn ensure_valid(&self) -> Result<ValidationResult, ConfigError> {
        let result = self.validate();
        if result.is_valid() {
            Ok(result)
        } else {
            Err(ConfigError::Invalid(result.error_summary()))
        }
    }

    /// Look up a configured site by URL.
    pub fn site(&self, url: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| site.url == url)
    }
}
