//! Certificate authority rate limits.
//!
//! This module provides the configuration type describing the quotas the
//! authority enforces per registrable domain:
//! - How many sites a single domain may carry
//! - How many renewals a domain may perform per rolling week
//! - When a certificate becomes eligible for renewal
//!
//! # Weekly Budget
//!
//! The authority does not expose the number of certificates issued in the
//! current week, so it is tracked indirectly: a certificate whose remaining
//! validity exceeds `full_validity_days - short_window_days` was issued inside
//! the current short window and still consumes part of that window's budget.
//!
//! Defaults follow <https://letsencrypt.org/docs/rate-limits/>.

use serde::{Deserialize, Serialize};

/// Maximum number of sites managed under one registrable domain.
pub const MAX_SITES_PER_DOMAIN: usize = 200;

/// Validity of a freshly issued certificate, in days.
pub const FULL_VALIDITY_DAYS: i64 = 90;

/// Renewals allowed per registrable domain per short window.
pub const MAX_RENEWALS_PER_WEEK: usize = 50;

/// Days-remaining at or under which a site becomes eligible for renewal.
pub const RENEWAL_THRESHOLD_DAYS: i64 = 30;

/// Length of the rolling quota window, in days.
pub const SHORT_WINDOW_DAYS: i64 = 7;

// ============================================================================
// Rate Limit Configuration
// ============================================================================

/// Rate limits applied by the admission-control policy.
///
/// Every field defaults to the authority's published value; overriding them
/// is only useful against a staging authority with different quotas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// Domains with more sites than this are excluded outright
    #[serde(default = "default_max_sites_per_domain")]
    pub max_sites_per_domain: usize,

    /// Validity period of a new certificate
    #[serde(default = "default_full_validity_days")]
    pub full_validity_days: i64,

    /// Renewals allowed per domain per short window
    #[serde(default = "default_weekly_cap")]
    pub weekly_cap: usize,

    /// Sites at or under this many days are renewal candidates
    #[serde(default = "default_renewal_threshold_days")]
    pub renewal_threshold_days: i64,

    /// Rolling quota window
    #[serde(default = "default_short_window_days")]
    pub short_window_days: i64,
}

fn default_max_sites_per_domain() -> usize {
    MAX_SITES_PER_DOMAIN
}

fn default_full_validity_days() -> i64 {
    FULL_VALIDITY_DAYS
}

fn default_weekly_cap() -> usize {
    MAX_RENEWALS_PER_WEEK
}

fn default_renewal_threshold_days() -> i64 {
    RENEWAL_THRESHOLD_DAYS
}

fn default_short_window_days() -> i64 {
    SHORT_WINDOW_DAYS
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            max_sites_per_domain: default_max_sites_per_domain(),
            full_validity_days: default_full_validity_days(),
            weekly_cap: default_weekly_cap(),
            renewal_threshold_days: default_renewal_threshold_days(),
            short_window_days: default_short_window_days(),
        }
    }
}

impl RateLimits {
    /// Days-remaining above which a certificate counts as issued inside the
    /// current short window.
    pub fn recently_renewed_above(&self) -> i64 {
        self.full_validity_days - self.short_window_days
    }

    /// Returns a description of the first inconsistent field, if any.
    pub fn check(&self) -> Option<String> {
        if self.short_window_days <= 0 {
            return Some("short-window-days must be positive".to_string());
        }
        if self.full_validity_days <= self.short_window_days {
            return Some("full-validity-days must exceed short-window-days".to_string());
        }
        if self.renewal_threshold_days < self.short_window_days {
            return Some("renewal-threshold-days must not be below short-window-days".to_string());
        }
        if self.weekly_cap == 0 {
            return Some("weekly-cap must be at least 1".to_string());
        }
        None
    }
}

// ============================================================================
// Exclusion Reasons
// ============================================================================

/// Why a whole domain was left out of a renewal cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// More sites than the authority allows per domain
    Capacity,
    /// More sites due inside the short window than the weekly cap
    WeeklyBacklog,
    /// Remaining weekly budget smaller than the short-window need
    BudgetExhausted,
}

impl ExclusionReason {
    /// Short label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionReason::Capacity => "capacity",
            ExclusionReason::WeeklyBacklog => "weekly_backlog",
            ExclusionReason::BudgetExhausted => "budget_exhausted",
        }
    }
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
