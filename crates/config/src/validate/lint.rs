//! Configuration linting for best practices
//!
//! Checks configuration for missing best practices and potential issues.

use super::{ValidationResult, ValidationWarning};
use crate::{Config, DnsServerType};
use certkeeper_common::category;

/// Lint configuration for best practices
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    for rule in &config.manager.recipients {
        // Tags nothing ever emits
        for tag in &rule.categories {
            if !category::is_known(tag) {
                result.add_warning(ValidationWarning::new(format!(
                    "Recipient '{}' subscribes to category '{}' which is never emitted (known: {})",
                    rule.notifier,
                    tag,
                    category::KNOWN.join(", ")
                )));
            }
        }

        if rule.destinations.is_empty() {
            result.add_warning(ValidationWarning::new(format!(
                "Recipient '{}' has no destinations",
                rule.notifier
            )));
        }
    }

    // Failures should reach someone
    if !config
        .manager
        .recipients
        .iter()
        .any(|r| r.subscribes_to(category::ERROR) && !r.destinations.is_empty())
    {
        result.add_warning(ValidationWarning::new(
            "No recipient subscribes to ERROR; renewal failures will only be logged".to_string(),
        ));
    }

    // Notifiers no rule uses
    for notifier in &config.notifiers {
        if !config
            .manager
            .recipients
            .iter()
            .any(|r| r.notifier.matches(&notifier.name))
        {
            result.add_warning(ValidationWarning::new(format!(
                "Notifier '{}' is not used by any recipient rule",
                notifier.name
            )));
        }
    }

    // Sites no static zone covers, when there is no dynamic server to ask
    let has_dynamic = config
        .dns_servers
        .iter()
        .any(|s| s.kind != DnsServerType::Static);
    if !has_dynamic {
        for site in &config.sites {
            let host = site.hostname().to_ascii_lowercase();
            let covered = config.dns_servers.iter().any(|server| {
                server
                    .zones
                    .iter()
                    .any(|zone| zone_covers(zone, &host))
            });
            if !covered {
                result.add_warning(ValidationWarning::new(format!(
                    "Site '{}' is not covered by any DNS server zone; its renewals will fail",
                    site.url
                )));
            }
        }
    }

    if config.acme.email.is_empty() {
        result.add_warning(ValidationWarning::new(
            "ACME account email is empty (expiry notices from the authority will be lost)"
                .to_string(),
        ));
    }

    if config.loop_restart_minutes == 0 {
        result.add_warning(ValidationWarning::new(
            "loop-restart-minutes is 0; daemon mode will run cycles back to back".to_string(),
        ));
    }

    result
}

fn zone_covers(zone: &str, host: &str) -> bool {
    let zone = zone.trim_end_matches('.').to_ascii_lowercase();
    host == zone || host.ends_with(&format!(".{}", zone))
}
