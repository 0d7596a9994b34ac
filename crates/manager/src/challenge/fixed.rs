use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::trace;

use super::{host_of, zone_covers, ChallengeBackend};

/// Backend authoritative for a fixed list of zones.
#[derive(Debug, Clone)]
pub struct StaticZonesBackend {
    name: String,
    provider: String,
    zones: Vec<String>,
    credentials: BTreeMap<String, String>,
}

impl StaticZonesBackend {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        zones: Vec<String>,
        credentials: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            zones,
            credentials,
        }
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }
}

#[async_trait]
impl ChallengeBackend for StaticZonesBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn credentials(&self) -> &BTreeMap<String, String> {
        &self.credentials
    }

    async fn is_authoritative_for_domain(&self, url: &str) -> bool {
        let host = host_of(url);
        let found = self.zones.iter().any(|zone| zone_covers(zone, &host));
        trace!(backend = %self.name, host = %host, authoritative = found, "Checked static zones");
        found
    }
}
