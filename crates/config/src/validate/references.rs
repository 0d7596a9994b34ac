//! Cross-reference validation
//!
//! Validates that every name used in the configuration points at something
//! defined, and that collaborator entries carry the fields their type needs.

use std::collections::HashSet;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::{Config, DnsServerType, NotifierType, UpdaterType};

/// Validate names and required fields
pub fn validate_references(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    // Recipient rules must name a configured notifier
    for rule in &config.manager.recipients {
        if !config.notifiers.iter().any(|n| rule.notifier.matches(&n.name)) {
            result.add_error(ValidationError::new(
                ErrorCategory::Reference,
                format!(
                    "Recipient rule refers to notifier '{}' which is not defined",
                    rule.notifier
                ),
            ));
        }
    }

    // Sites must be deployable by at least one updater
    for site in &config.sites {
        if !config.updaters.iter().any(|u| u.name == site.server) {
            result.add_error(ValidationError::new(
                ErrorCategory::Reference,
                format!(
                    "Site '{}' refers to server '{}' but no updater has that name",
                    site.url, site.server
                ),
            ));
        }
        if site.url.trim().is_empty() {
            result.add_error(ValidationError::new(ErrorCategory::Site, "Site with empty url"));
        }
        if site.port == 0 {
            result.add_error(ValidationError::new(
                ErrorCategory::Site,
                format!("Site '{}' has port 0", site.url),
            ));
        }
    }

    let mut seen = HashSet::new();
    for site in &config.sites {
        if !seen.insert(site.url.as_str()) {
            result.add_warning(ValidationWarning::new(format!(
                "Site '{}' is configured more than once",
                site.url
            )));
        }
    }

    for updater in &config.updaters {
        if updater.kind == UpdaterType::Remote && updater.remote.is_none() {
            result.add_error(ValidationError::new(
                ErrorCategory::Collaborator,
                format!("Remote updater '{}' has no remote connection", updater.name),
            ));
        }
    }

    for notifier in &config.notifiers {
        match notifier.kind {
            NotifierType::Rocket if notifier.webhook_url.is_none() => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Collaborator,
                    format!("Rocket notifier '{}' has no webhook-url", notifier.name),
                ));
            }
            NotifierType::Mail if notifier.smtp.is_none() => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Collaborator,
                    format!("Mail notifier '{}' has no smtp block", notifier.name),
                ));
            }
            _ => {}
        }
    }

    for server in &config.dns_servers {
        match server.kind {
            DnsServerType::Static if server.zones.is_empty() => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Collaborator,
                    format!("Static DNS server '{}' lists no zones", server.name),
                ));
            }
            DnsServerType::Powerdns if server.api_url.is_none() => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Collaborator,
                    format!("PowerDNS server '{}' has no api-url", server.name),
                ));
            }
            _ => {}
        }
    }

    if let Some(problem) = config.manager.limits.check() {
        result.add_error(ValidationError::new(ErrorCategory::Limits, problem));
    }

    result
}
