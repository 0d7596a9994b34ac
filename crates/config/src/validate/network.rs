//! Network connectivity validation
//!
//! Validates that remote updater hosts accept SSH connections.

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::{Config, UpdaterType};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Validate remote updater connectivity
pub async fn validate_remote_hosts(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    for updater in &config.updaters {
        if updater.kind != UpdaterType::Remote {
            continue;
        }
        let Some(remote) = &updater.remote else {
            continue;
        };
        let address = remote.address();

        match timeout(Duration::from_secs(5), TcpStream::connect(&address)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                result.add_error(ValidationError::new(
                    ErrorCategory::Network,
                    format!(
                        "Updater '{}' host '{}' unreachable: {}",
                        updater.name, address, e
                    ),
                ));
            }
            Err(_) => {
                result.add_warning(ValidationWarning::new(format!(
                    "Updater '{}' host '{}' connection timeout (5s)",
                    updater.name, address
                )));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RemoteConnection, UpdaterConfig};
    use certkeeper_common::ServerId;

    fn remote_updater(hostname: &str, port: u16) -> UpdaterConfig {
        let mut remote = RemoteConnection::new(hostname);
        remote.port = port;
        UpdaterConfig {
            name: ServerId::new("web-2"),
            kind: UpdaterType::Remote,
            owner: None,
            reload_command: None,
            remote: Some(remote),
        }
    }

    #[tokio::test]
    async fn test_validate_remote_unreachable() {
        let config = Config {
            // TEST-NET-1 (unreachable)
            updaters: vec![remote_updater("192.0.2.1", 9999)],
            ..Default::default()
        };

        let result = validate_remote_hosts(&config).await;

        // Should have either an error or warning (depending on timeout)
        assert!(!result.errors.is_empty() || !result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_validate_remote_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = Config {
            updaters: vec![remote_updater("127.0.0.1", port)],
            ..Default::default()
        };

        let result = validate_remote_hosts(&config).await;
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }
}
