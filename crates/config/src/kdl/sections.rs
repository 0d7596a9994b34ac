//! Site, collaborator and manager KDL parsing.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::trace;

use certkeeper_common::{NotifierName, RateLimits, ServerId};

use crate::manager::{ManagerConfig, RecipientConfig};
use crate::services::{
    AcmeConfig, DnsServerConfig, DnsServerType, NotifierConfig, NotifierType, RemoteConnection,
    SmtpConfig, SmtpTls, UpdaterConfig, UpdaterType,
};
use crate::site::{default_port, LocationConfig, SiteConfig};

use super::helpers::{
    arg_strings, child, children, get_bool_entry, get_bounded_int, get_first_arg_string,
    get_string_entry, get_string_list,
};

fn required_id(node: &kdl::KdlNode, example: &str) -> Result<String> {
    get_first_arg_string(node).ok_or_else(|| {
        anyhow::anyhow!(
            "'{}' requires a name argument, e.g., {}",
            node.name().value(),
            example
        )
    })
}

/// Parse the `manager` block
pub fn parse_manager(node: &kdl::KdlNode) -> Result<ManagerConfig> {
    trace!("Parsing manager configuration block");
    let mut recipients = Vec::new();

    for rule in children(node).iter().filter(|c| c.name().value() == "recipient") {
        let notifier = required_id(rule, "recipient \"rocket\" { ... }")?;
        recipients.push(RecipientConfig {
            notifier: NotifierName::new(notifier),
            categories: get_string_list(rule, "categories"),
            destinations: get_string_list(rule, "destinations"),
        });
    }

    let limits = match child(node, "limits") {
        Some(limits) => parse_limits(limits)?,
        None => RateLimits::default(),
    };

    trace!(recipient_count = recipients.len(), "Parsed manager configuration");
    Ok(ManagerConfig { recipients, limits })
}

fn parse_limits(node: &kdl::KdlNode) -> Result<RateLimits> {
    let defaults = RateLimits::default();
    Ok(RateLimits {
        max_sites_per_domain: get_bounded_int(node, "max-sites-per-domain")?
            .unwrap_or(defaults.max_sites_per_domain),
        full_validity_days: get_bounded_int(node, "full-validity-days")?
            .unwrap_or(defaults.full_validity_days),
        weekly_cap: get_bounded_int(node, "weekly-cap")?.unwrap_or(defaults.weekly_cap),
        renewal_threshold_days: get_bounded_int(node, "renewal-threshold-days")?
            .unwrap_or(defaults.renewal_threshold_days),
        short_window_days: get_bounded_int(node, "short-window-days")?
            .unwrap_or(defaults.short_window_days),
    })
}

/// Parse a `site "host" { ... }` node
pub fn parse_site(node: &kdl::KdlNode) -> Result<SiteConfig> {
    let url = required_id(node, "site \"www.example.com\" { ... }")?;
    trace!(site = %url, "Parsing site");

    let server = get_string_entry(node, "server").ok_or_else(|| {
        anyhow::anyhow!(
            "Site '{}' requires a 'server' field, e.g., server \"web-1\"",
            url
        )
    })?;

    Ok(SiteConfig {
        server: ServerId::new(server),
        port: get_bounded_int(node, "port")
            .with_context(|| format!("site '{}'", url))?
            .unwrap_or_else(default_port),
        domain: get_string_entry(node, "domain"),
        location: LocationConfig {
            certificate: get_string_entry(node, "certificate")
                .map(PathBuf::from)
                .unwrap_or_default(),
            private_key: get_string_entry(node, "private-key")
                .map(PathBuf::from)
                .unwrap_or_default(),
        },
        url,
    })
}

/// Parse an `updater "name" { ... }` node
pub fn parse_updater(node: &kdl::KdlNode) -> Result<UpdaterConfig> {
    let name = required_id(node, "updater \"web-1\" { ... }")?;

    let type_str = get_string_entry(node, "type").unwrap_or_else(|| "local".to_string());
    let kind = match type_str.to_lowercase().as_str() {
        "local" => UpdaterType::Local,
        "remote" => UpdaterType::Remote,
        other => {
            return Err(anyhow::anyhow!(
                "Invalid type '{}' for updater '{}'. Valid types: local, remote",
                other,
                name
            ));
        }
    };

    let remote = match child(node, "remote") {
        Some(remote) => {
            let hostname = get_string_entry(remote, "hostname").ok_or_else(|| {
                anyhow::anyhow!("Updater '{}' remote block requires a 'hostname'", name)
            })?;
            let mut connection = RemoteConnection::new(hostname);
            if let Some(port) = get_bounded_int(remote, "port")? {
                connection.port = port;
            }
            connection.identity_file = get_string_entry(remote, "identity-file").map(PathBuf::from);
            Some(connection)
        }
        None => None,
    };

    trace!(updater = %name, kind = ?kind, "Parsed updater");

    Ok(UpdaterConfig {
        name: ServerId::new(name),
        kind,
        owner: get_string_entry(node, "owner"),
        reload_command: get_string_entry(node, "reload-command"),
        remote,
    })
}

/// Parse a `notifier "name" { ... }` node
pub fn parse_notifier(node: &kdl::KdlNode) -> Result<NotifierConfig> {
    let name = required_id(node, "notifier \"rocket\" { ... }")?;

    let type_str = get_string_entry(node, "type").ok_or_else(|| {
        anyhow::anyhow!("Notifier '{}' requires a 'type' field (rocket, mail, log)", name)
    })?;
    let kind = match type_str.to_lowercase().as_str() {
        "rocket" => NotifierType::Rocket,
        "mail" => NotifierType::Mail,
        "log" => NotifierType::Log,
        other => {
            return Err(anyhow::anyhow!(
                "Invalid type '{}' for notifier '{}'. Valid types: rocket, mail, log",
                other,
                name
            ));
        }
    };

    let smtp = match child(node, "smtp") {
        Some(smtp) => Some(
            parse_smtp(smtp).with_context(|| format!("Notifier '{}' smtp block", name))?,
        ),
        None => None,
    };

    Ok(NotifierConfig {
        name,
        kind,
        webhook_url: get_string_entry(node, "webhook-url"),
        username: get_string_entry(node, "username"),
        smtp,
    })
}

fn parse_smtp(node: &kdl::KdlNode) -> Result<SmtpConfig> {
    let host = get_string_entry(node, "host")
        .ok_or_else(|| anyhow::anyhow!("'smtp' requires a 'host'"))?;
    let from = get_string_entry(node, "from")
        .ok_or_else(|| anyhow::anyhow!("'smtp' requires a 'from' address"))?;

    let mut smtp = SmtpConfig::new(host, from);
    if let Some(port) = get_bounded_int(node, "port")? {
        smtp.port = port;
    }
    smtp.username = get_string_entry(node, "username");
    smtp.password = get_string_entry(node, "password");
    if let Some(tls) = get_string_entry(node, "tls") {
        smtp.tls = match tls.to_lowercase().as_str() {
            "none" => SmtpTls::None,
            "starttls" => SmtpTls::Starttls,
            "tls" => SmtpTls::Tls,
            other => {
                return Err(anyhow::anyhow!(
                    "Invalid tls '{}'. Valid values: none, starttls, tls",
                    other
                ));
            }
        };
    }
    Ok(smtp)
}

/// Parse a `dns-server "name" { ... }` node
pub fn parse_dns_server(node: &kdl::KdlNode) -> Result<DnsServerConfig> {
    let name = required_id(node, "dns-server \"gandi\" { ... }")?;

    let type_str = get_string_entry(node, "type").unwrap_or_else(|| "static".to_string());
    let kind = match type_str.to_lowercase().as_str() {
        "static" => DnsServerType::Static,
        "powerdns" | "pdns" => DnsServerType::Powerdns,
        other => {
            return Err(anyhow::anyhow!(
                "Invalid type '{}' for dns-server '{}'. Valid types: static, powerdns",
                other,
                name
            ));
        }
    };

    let mut env = BTreeMap::new();
    if let Some(env_node) = child(node, "env") {
        for var in children(env_node) {
            let value = arg_strings(var).into_iter().next().ok_or_else(|| {
                anyhow::anyhow!(
                    "dns-server '{}' env entry '{}' requires a value",
                    name,
                    var.name().value()
                )
            })?;
            env.insert(var.name().value().to_string(), value);
        }
    }

    Ok(DnsServerConfig {
        kind,
        provider: get_string_entry(node, "provider"),
        zones: get_string_list(node, "zones"),
        api_url: get_string_entry(node, "api-url"),
        api_key: get_string_entry(node, "api-key"),
        server_id: get_string_entry(node, "server-id"),
        env,
        name,
    })
}

/// Parse the `acme` block
pub fn parse_acme(node: &kdl::KdlNode) -> Result<AcmeConfig> {
    let defaults = AcmeConfig::default();
    Ok(AcmeConfig {
        email: get_string_entry(node, "email").unwrap_or_default(),
        command: get_string_entry(node, "command").unwrap_or(defaults.command),
        staging: get_bool_entry(node, "staging").unwrap_or(false),
        server: get_string_entry(node, "server"),
        key_type: get_string_entry(node, "key-type"),
    })
}
