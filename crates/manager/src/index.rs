//! Grouping of probed sites by registrable domain.
//!
//! The authority's rate limits apply per registered domain, so every cycle
//! starts by regrouping the probed sites. Groups keep the order in which
//! their domain was first seen; sites inside a group are ordered by
//! remaining validity, most urgent first.

use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::site::SharedSite;

/// Sites sharing a registrable domain, most urgent first.
#[derive(Clone)]
pub struct DomainGroup {
    pub name: String,
    pub sites: Vec<SharedSite>,
}

impl DomainGroup {
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Remaining days of every site, in group order
    pub fn days_left(&self) -> Vec<i64> {
        self.sites.iter().map(|s| s.days_left()).collect()
    }
}

impl fmt::Debug for DomainGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainGroup")
            .field("name", &self.name)
            .field(
                "sites",
                &self
                    .sites
                    .iter()
                    .map(|s| s.config().url.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Group `sites` by domain and sort each group by days left.
///
/// Sorting is stable, so sites with equal validity keep their input order.
/// Sites without a domain all land in the group named `""`.
pub fn index_sites(sites: &[SharedSite]) -> Vec<DomainGroup> {
    let mut groups: Vec<DomainGroup> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for site in sites {
        let domain = site.domain();
        let position = *positions.entry(domain).or_insert_with(|| {
            groups.push(DomainGroup {
                name: domain.to_string(),
                sites: Vec::new(),
            });
            groups.len() - 1
        });
        groups[position].sites.push(site.clone());
    }

    for group in &mut groups {
        group.sites.sort_by_cached_key(|site| site.days_left());
    }

    debug!(
        site_count = sites.len(),
        domain_count = groups.len(),
        "Indexed sites per domain"
    );

    groups
}
