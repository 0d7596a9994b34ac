//! Rate-limit admission control.
//!
//! The certificate authority enforces a per-domain weekly issuance cap. A
//! domain whose urgent backlog cannot be cleared within that cap is skipped
//! for the whole cycle; for the remaining domains, the most urgent sites are
//! picked until the week's budget is used up.
//!
//! Nothing here mutates the index. [`RateLimitPolicy::sites_to_renew`]
//! builds a fresh [`Selection`] describing what was picked and why domains
//! were left out.

use std::fmt;
use tracing::{debug, error, warn};

use certkeeper_common::{ExclusionReason, RateLimits};

use crate::index::DomainGroup;
use crate::site::SharedSite;

/// A domain left out of the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub domain: String,
    pub reason: ExclusionReason,
    pub site_count: usize,
    /// Sites within the short window
    pub urgent: usize,
    pub remaining_budget: i64,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} sites, {} urgent, budget {})",
            self.domain, self.reason, self.site_count, self.urgent, self.remaining_budget
        )
    }
}

/// Candidates picked from one domain.
#[derive(Clone)]
pub struct Candidates {
    pub sites: Vec<SharedSite>,
    /// More sites are inside the threshold than inside the short window
    pub backlog: bool,
}

/// Outcome of admission control over a whole index.
#[derive(Clone, Default)]
pub struct Selection {
    /// Sites to renew this cycle, in domain order then urgency order
    pub sites: Vec<SharedSite>,
    pub exclusions: Vec<Exclusion>,
    /// Domains where only the most urgent sites fit
    pub backlogged: Vec<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// URLs of the selected sites
    pub fn urls(&self) -> Vec<&str> {
        self.sites.iter().map(|s| s.config().url.as_str()).collect()
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("sites", &self.urls())
            .field("exclusions", &self.exclusions)
            .field("backlogged", &self.backlogged)
            .finish()
    }
}

/// Per-domain admission control.
#[derive(Debug, Clone, Default)]
pub struct RateLimitPolicy {
    limits: RateLimits,
}

impl RateLimitPolicy {
    pub fn new(limits: RateLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// Sites with at most `threshold_days` left.
    pub fn count_needing_renewal_within(&self, group: &DomainGroup, threshold_days: i64) -> usize {
        count_within(&group.days_left(), threshold_days)
    }

    /// Weekly cap minus the sites that were renewed during the last
    /// short window. Negative when the cap is already exceeded.
    pub fn remaining_weekly_budget(&self, group: &DomainGroup) -> i64 {
        self.budget_from(&group.days_left())
    }

    /// Why `group` cannot be renewed this cycle, if it cannot.
    pub fn exclusion_reason(&self, group: &DomainGroup) -> Option<ExclusionReason> {
        self.check(group).map(|exclusion| exclusion.reason)
    }

    pub fn is_domain_eligible(&self, group: &DomainGroup) -> bool {
        self.check(group).is_none()
    }

    fn check(&self, group: &DomainGroup) -> Option<Exclusion> {
        let days = group.days_left();
        let urgent = count_within(&days, self.limits.short_window_days);
        let budget = self.budget_from(&days);

        let reason = if group.len() > self.limits.max_sites_per_domain {
            ExclusionReason::Capacity
        } else if urgent > self.limits.weekly_cap {
            ExclusionReason::WeeklyBacklog
        } else if budget < urgent as i64 {
            ExclusionReason::BudgetExhausted
        } else {
            return None;
        };

        Some(Exclusion {
            domain: group.name.clone(),
            reason,
            site_count: group.len(),
            urgent,
            remaining_budget: budget,
        })
    }

    /// Most urgent sites of `group` within the threshold, capped by the
    /// remaining weekly budget.
    pub fn select_candidates(&self, group: &DomainGroup) -> Candidates {
        let days = group.days_left();
        let budget = self.budget_from(&days);
        let backlog = count_within(&days, self.limits.renewal_threshold_days)
            > count_within(&days, self.limits.short_window_days);

        if backlog {
            warn!(
                domain = %group.name,
                remaining_budget = budget,
                "Renewal backlog; only the most urgent sites will be renewed"
            );
        }

        let mut sites = Vec::new();
        for (site, left) in group.sites.iter().zip(days) {
            if sites.len() as i64 >= budget {
                break;
            }
            if left <= self.limits.renewal_threshold_days {
                sites.push(site.clone());
            }
        }

        debug!(
            domain = %group.name,
            selected = sites.len(),
            remaining_budget = budget,
            "Selected renewal candidates"
        );

        Candidates { sites, backlog }
    }

    /// Drop ineligible domains and concatenate the candidates of the rest.
    pub fn sites_to_renew(&self, groups: &[DomainGroup]) -> Selection {
        let mut selection = Selection::default();

        for group in groups {
            if let Some(exclusion) = self.check(group) {
                error!(
                    domain = %exclusion.domain,
                    reason = %exclusion.reason,
                    site_count = exclusion.site_count,
                    urgent = exclusion.urgent,
                    remaining_budget = exclusion.remaining_budget,
                    "Discarding domain; renewing it would exceed the authority rate limits"
                );
                selection.exclusions.push(exclusion);
                continue;
            }

            let candidates = self.select_candidates(group);
            if candidates.backlog {
                selection.backlogged.push(group.name.clone());
            }
            selection.sites.extend(candidates.sites);
        }

        selection
    }

    fn budget_from(&self, days: &[i64]) -> i64 {
        let recent_above = self.limits.recently_renewed_above();
        let recent = days.iter().filter(|&&d| d > recent_above).count();
        self.limits.weekly_cap as i64 - recent as i64
    }
}

fn count_within(days: &[i64], threshold_days: i64) -> usize {
    days.iter().filter(|&&d| d <= threshold_days).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::index_sites;
    use crate::testing::sites;
    use proptest::prelude::*;

    fn group(sites: Vec<SharedSite>) -> DomainGroup {
        index_sites(&sites).remove(0)
    }

    fn policy() -> RateLimitPolicy {
        RateLimitPolicy::default()
    }

    #[test]
    fn test_counts_and_budget() {
        let mut input = sites("example.com", 3, 5);
        input.extend(sites("example.com", 2, 20));
        input.extend(sites("example.com", 4, 88));
        let g = group(input);

        assert_eq!(policy().count_needing_renewal_within(&g, 7), 3);
        assert_eq!(policy().count_needing_renewal_within(&g, 30), 5);
        // 4 sites renewed within the last week
        assert_eq!(policy().remaining_weekly_budget(&g), 46);
        assert!(policy().is_domain_eligible(&g));
    }

    #[test]
    fn test_capacity_exclusion_regardless_of_urgency() {
        let g = group(sites("example.com", 201, 60));
        assert_eq!(
            policy().exclusion_reason(&g),
            Some(ExclusionReason::Capacity)
        );

        let g = group(sites("example.com", 200, 60));
        assert!(policy().is_domain_eligible(&g));
    }

    #[test]
    fn test_weekly_backlog_exclusion() {
        let g = group(sites("example.com", 51, 3));
        assert_eq!(
            policy().exclusion_reason(&g),
            Some(ExclusionReason::WeeklyBacklog)
        );
    }

    #[test]
    fn test_budget_exclusion() {
        // 45 fresh certificates leave a budget of 5 for 6 urgent sites
        let mut input = sites("example.com", 45, 89);
        input.extend(sites("example.com", 6, 2));
        let g = group(input);

        assert_eq!(policy().remaining_weekly_budget(&g), 5);
        assert_eq!(
            policy().exclusion_reason(&g),
            Some(ExclusionReason::BudgetExhausted)
        );
    }

    #[test]
    fn test_selects_first_fifty_of_sixty() {
        let input = sites("example.com", 60, 10);
        let expected: Vec<String> = input[..50]
            .iter()
            .map(|s| s.config().url.clone())
            .collect();
        let g = group(input);

        let candidates = policy().select_candidates(&g);

        assert!(candidates.backlog);
        let selected: Vec<String> = candidates
            .sites
            .iter()
            .map(|s| s.config().url.clone())
            .collect();
        assert_eq!(selected, expected);
    }

    #[test]
    fn test_no_candidates_above_threshold() {
        let mut input = sites("example.com", 3, 31);
        input.extend(sites("example.com", 2, 30));
        let g = group(input);

        let candidates = policy().select_candidates(&g);

        assert_eq!(candidates.sites.len(), 2);
        assert!(candidates.sites.iter().all(|s| s.days_left() <= 30));
    }

    #[test]
    fn test_sites_to_renew_skips_oversized_domain() {
        let mut input = sites("big.com", 210, 1);
        input.extend(sites("small.com", 2, 4));
        let groups = index_sites(&input);

        let selection = policy().sites_to_renew(&groups);

        assert_eq!(selection.urls(), vec!["s0.small.com", "s1.small.com"]);
        assert_eq!(selection.exclusions.len(), 1);
        assert_eq!(selection.exclusions[0].domain, "big.com");
        assert_eq!(selection.exclusions[0].reason, ExclusionReason::Capacity);
    }

    #[test]
    fn test_sites_to_renew_is_pure() {
        let groups = index_sites(&sites("big.com", 210, 1));
        let before = groups.len();

        let first = policy().sites_to_renew(&groups);
        let second = policy().sites_to_renew(&groups);

        assert_eq!(groups.len(), before);
        assert!(first.is_empty() && second.is_empty());
        assert_eq!(first.exclusions, second.exclusions);
    }

    #[test]
    fn test_backlogged_domains_are_reported() {
        let mut input = sites("example.com", 1, 2);
        input.extend(sites("example.com", 1, 25));
        input.extend(sites("example.org", 1, 2));
        let selection = policy().sites_to_renew(&index_sites(&input));

        assert_eq!(selection.len(), 3);
        assert_eq!(selection.backlogged, vec!["example.com"]);
    }

    #[test]
    fn test_custom_limits() {
        let policy = RateLimitPolicy::new(RateLimits {
            weekly_cap: 2,
            ..RateLimits::default()
        });
        let g = group(sites("example.com", 5, 20));

        assert_eq!(policy.select_candidates(&g).sites.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_selection_within_threshold_and_budget(
            days in prop::collection::vec(-3i64..95, 0..120)
        ) {
            let input: Vec<SharedSite> = days
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    crate::testing::FakeSite::new(&format!("s{}.example.com", i), *d).shared()
                })
                .collect();
            let groups = index_sites(&input);
            let policy = RateLimitPolicy::default();

            for g in &groups {
                let candidates = policy.select_candidates(g);
                let budget = policy.remaining_weekly_budget(g).max(0) as usize;
                prop_assert!(candidates.sites.len() <= budget);
                prop_assert!(candidates.sites.iter().all(|s| s.days_left() <= 30));
            }

            let selection = policy.sites_to_renew(&groups);
            prop_assert!(selection.sites.iter().all(|s| s.days_left() <= 30));
        }
    }
}
