//! Collaborator configuration: updaters, notifiers, DNS servers and the
//! ACME client.
//!
//! Each collaborator entry carries a `type` tag; the renewal manager's
//! factory picks the concrete implementation from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use certkeeper_common::ServerId;

// ============================================================================
// Certificate Updaters
// ============================================================================

/// How certificate material reaches the target server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdaterType {
    /// Copy on this host
    Local,
    /// Copy over scp, reload over ssh
    Remote,
}

/// Deploys material for every site whose `server` equals `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Server identifier sites refer to
    pub name: ServerId,

    #[serde(rename = "type")]
    pub kind: UpdaterType,

    /// Owner given to deployed files (local) or login user (remote)
    #[serde(default, alias = "certificates_owner")]
    pub owner: Option<String>,

    /// Command that makes the service pick up the new certificate
    #[serde(default, alias = "reload_cmd")]
    pub reload_command: Option<String>,

    /// Required for `remote` updaters
    #[serde(default, alias = "remote_connection")]
    pub remote: Option<RemoteConnection>,
}

/// SSH endpoint of a remote updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConnection {
    pub hostname: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Private key passed to scp/ssh with `-i`
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

fn default_ssh_port() -> u16 {
    22
}

impl RemoteConnection {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: default_ssh_port(),
            identity_file: None,
        }
    }

    /// `host:port` form used for reachability checks.
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

// ============================================================================
// Notifiers
// ============================================================================

/// Delivery channel of a notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierType {
    /// Rocket.Chat-style incoming webhook; destinations are channels
    Rocket,
    /// Structured log line only; destinations are labels
    Log,
    /// SMTP mail; destinations are recipient addresses
    Mail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Name recipient rules refer to
    pub name: String,

    #[serde(rename = "type")]
    pub kind: NotifierType,

    /// Required for `rocket` notifiers
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Display name attached to webhook posts
    #[serde(default)]
    pub username: Option<String>,

    /// Required for `mail` notifiers
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl NotifierConfig {
    /// A notifier of `kind` with no channel settings.
    pub fn new(name: impl Into<String>, kind: NotifierType) -> Self {
        Self {
            name: name.into(),
            kind,
            webhook_url: None,
            username: None,
            smtp: None,
        }
    }
}

/// Transport security used to reach the SMTP server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpTls {
    /// Plain connection
    None,
    /// Upgrade with STARTTLS, refusing servers that do not offer it
    #[default]
    Starttls,
    /// Implicit TLS (SMTPS)
    Tls,
}

/// Mail server a `mail` notifier submits through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender, either `addr@host` or `Name <addr@host>`
    pub from: String,

    #[serde(default)]
    pub tls: SmtpTls,
}

fn default_smtp_port() -> u16 {
    587
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from: from.into(),
            tls: SmtpTls::default(),
        }
    }
}

// ============================================================================
// DNS Challenge Servers
// ============================================================================

/// How a DNS server decides which domains it is authoritative for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnsServerType {
    /// Fixed list of zones
    Static,
    /// Zones reported by a PowerDNS HTTP API
    Powerdns,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsServerConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: DnsServerType,

    /// DNS provider code handed to the ACME tool (e.g. `gandiv5`)
    #[serde(default)]
    pub provider: Option<String>,

    /// Zones served (`static` only)
    #[serde(default)]
    pub zones: Vec<String>,

    /// API base URL (`powerdns` only)
    #[serde(default)]
    pub api_url: Option<String>,

    /// API key (`powerdns` only)
    #[serde(default)]
    pub api_key: Option<String>,

    /// PowerDNS server id, `localhost` when absent
    #[serde(default)]
    pub server_id: Option<String>,

    /// Extra credentials exported to the ACME tool
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl DnsServerConfig {
    /// A `static` server for `zones` using `provider`.
    pub fn fixed(name: impl Into<String>, provider: impl Into<String>, zones: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind: DnsServerType::Static,
            provider: Some(provider.into()),
            zones: zones.iter().map(|z| z.to_string()).collect(),
            api_url: None,
            api_key: None,
            server_id: None,
            env: BTreeMap::new(),
        }
    }
}

// ============================================================================
// ACME Client
// ============================================================================

/// External ACME tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcmeConfig {
    /// Account contact
    #[serde(default)]
    pub email: String,

    /// lego-compatible executable
    #[serde(default = "default_acme_command")]
    pub command: String,

    /// Use the authority's staging directory
    #[serde(default)]
    pub staging: bool,

    /// Directory URL override
    #[serde(default)]
    pub server: Option<String>,

    /// Key type flag passed through (e.g. `ec256`)
    #[serde(default)]
    pub key_type: Option<String>,
}

fn default_acme_command() -> String {
    "lego".to_string()
}

/// Let's Encrypt staging directory.
pub const STAGING_DIRECTORY: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            command: default_acme_command(),
            staging: false,
            server: None,
            key_type: None,
        }
    }
}

impl AcmeConfig {
    /// Directory the tool should talk to, if not its default.
    pub fn directory(&self) -> Option<&str> {
        match self.server.as_deref() {
            Some(server) => Some(server),
            None if self.staging => Some(STAGING_DIRECTORY),
            None => None,
        }
    }
}
