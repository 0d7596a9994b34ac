//! PowerDNS backend.
//!
//! Authority is decided from the zone list the PowerDNS HTTP API reports
//! (`GET /api/v1/servers/{server}/zones`), fetched on every check so zones
//! added between cycles are picked up.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{host_of, zone_covers, ChallengeBackend};
use crate::errors::CollaboratorError;

/// Provider code lego uses for PowerDNS
const PROVIDER: &str = "pdns";

#[derive(Debug, Deserialize)]
struct Zone {
    name: String,
}

#[derive(Debug, Clone)]
pub struct PowerDnsBackend {
    name: String,
    api_url: String,
    api_key: String,
    server_id: String,
    credentials: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl PowerDnsBackend {
    /// `env` is merged over the `PDNS_API_URL` / `PDNS_API_KEY` pair.
    pub fn new(
        name: impl Into<String>,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        server_id: Option<String>,
        env: BTreeMap<String, String>,
        client: reqwest::Client,
    ) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();

        let mut credentials = BTreeMap::new();
        credentials.insert("PDNS_API_URL".to_string(), api_url.clone());
        credentials.insert("PDNS_API_KEY".to_string(), api_key.clone());
        credentials.extend(env);

        Self {
            name: name.into(),
            api_url,
            api_key,
            server_id: server_id.unwrap_or_else(|| "localhost".to_string()),
            credentials,
            client,
        }
    }

    /// Zones currently served, as reported by the API.
    pub async fn zones(&self) -> Result<Vec<String>, CollaboratorError> {
        let url = format!("{}/api/v1/servers/{}/zones", self.api_url, self.server_id);
        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("PowerDNS API returned HTTP {}", status).into());
        }

        let zones: Vec<Zone> = response.json().await?;
        debug!(backend = %self.name, zone_count = zones.len(), "Fetched PowerDNS zones");
        Ok(zones.into_iter().map(|z| z.name).collect())
    }
}

#[async_trait]
impl ChallengeBackend for PowerDnsBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        PROVIDER
    }

    fn credentials(&self) -> &BTreeMap<String, String> {
        &self.credentials
    }

    async fn is_authoritative_for_domain(&self, url: &str) -> bool {
        let host = host_of(url);
        match self.zones().await {
            Ok(zones) => zones.iter().any(|zone| zone_covers(zone, &host)),
            Err(e) => {
                warn!(
                    backend = %self.name,
                    host = %host,
                    error = %e,
                    "Failed to list PowerDNS zones; treating backend as not authoritative"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(uri: String) -> PowerDnsBackend {
        PowerDnsBackend::new(
            "pdns",
            format!("{}/", uri),
            "secret",
            None,
            BTreeMap::new(),
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn test_authority_from_api_zones() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/servers/localhost/zones"))
            .and(header("X-API-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "example.com.", "kind": "Native"},
                {"name": "internal.example.net.", "kind": "Native"}
            ])))
            .mount(&server)
            .await;

        let backend = backend(server.uri());

        assert!(backend.is_authoritative_for_domain("www.example.com").await);
        assert!(backend.is_authoritative_for_domain("a.internal.example.net").await);
        assert!(!backend.is_authoritative_for_domain("www.example.net").await);
    }

    #[tokio::test]
    async fn test_api_failure_is_not_authoritative() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let backend = backend(server.uri());
        assert!(!backend.is_authoritative_for_domain("www.example.com").await);
    }

    #[test]
    fn test_credentials() {
        let mut env = BTreeMap::new();
        env.insert("PDNS_TTL".to_string(), "60".to_string());
        let backend = PowerDnsBackend::new(
            "pdns",
            "http://pdns:8081/",
            "k",
            Some("ns1".to_string()),
            env,
            reqwest::Client::new(),
        );

        assert_eq!(backend.provider(), "pdns");
        let creds = backend.credentials();
        assert_eq!(creds.get("PDNS_API_URL").unwrap(), "http://pdns:8081");
        assert_eq!(creds.get("PDNS_API_KEY").unwrap(), "k");
        assert_eq!(creds.get("PDNS_TTL").unwrap(), "60");
    }
}
