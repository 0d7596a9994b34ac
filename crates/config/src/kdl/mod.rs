//! KDL configuration parsing.
//!
//! Top-level nodes map one-to-one onto [`Config`](crate::Config) fields;
//! repeated nodes (`site`, `updater`, `notifier`, `dns-server`) build the
//! corresponding lists in document order.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{trace, warn};

use crate::Config;

pub mod helpers;
pub mod sections;

use helpers::get_first_arg_string;
use sections::{
    parse_acme, parse_dns_server, parse_manager, parse_notifier, parse_site, parse_updater,
};

/// Build a [`Config`] from a parsed KDL document.
pub fn parse_document(doc: &kdl::KdlDocument) -> Result<Config> {
    let mut config = Config::default();

    for node in doc.nodes() {
        let name = node.name().value();
        trace!(node = %name, "Parsing top-level node");

        match name {
            "manager" => config.manager = parse_manager(node)?,
            "site" => config.sites.push(parse_site(node)?),
            "updater" => config.updaters.push(parse_updater(node)?),
            "notifier" => config.notifiers.push(parse_notifier(node)?),
            "dns-server" => config.dns_servers.push(parse_dns_server(node)?),
            "acme" => config.acme = parse_acme(node)?,
            "certificates-root" => {
                config.certificates_root = get_first_arg_string(node)
                    .map(PathBuf::from)
                    .context("certificates-root requires a path argument")?;
            }
            "loop-restart-minutes" => {
                let minutes = node
                    .entries()
                    .first()
                    .and_then(|e| e.value().as_integer())
                    .context("loop-restart-minutes requires an integer argument")?;
                config.loop_restart_minutes = u64::try_from(minutes)
                    .map_err(|_| anyhow::anyhow!("loop-restart-minutes must not be negative"))?;
            }
            other => {
                warn!(node = %other, "Ignoring unknown configuration node");
            }
        }
    }

    Ok(config)
}
