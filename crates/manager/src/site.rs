//! The probed-site capability set used by the renewal core.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use certkeeper_config::SiteConfig;

use crate::errors::CollaboratorError;

/// A managed site whose deployed certificate can be inspected.
///
/// `days_left` is derived from the last probe and the current time on every
/// call; `refresh` re-reads the certificate.
#[async_trait]
pub trait SiteProbe: Send + Sync {
    /// Whole days until the deployed certificate expires
    fn days_left(&self) -> i64;

    /// Re-read the deployed certificate
    async fn refresh(&self) -> Result<(), CollaboratorError>;

    /// Whether the certificate was issued for this site's hostname
    fn is_site_valid(&self) -> bool;

    /// Site configuration
    fn config(&self) -> &SiteConfig;

    /// Registrable domain used for rate-limit grouping
    fn domain(&self) -> &str;

    /// Refresh, then report the remaining days.
    ///
    /// A certificate that does not match the site hostname is an error,
    /// unless it has already run out.
    async fn refresh_and_get_days_left(&self) -> Result<i64, CollaboratorError> {
        self.refresh().await?;
        let days = self.days_left();
        if days > 0 && !self.is_site_valid() {
            return Err(format!(
                "deployed certificate does not cover {}",
                self.config().hostname()
            )
            .into());
        }
        Ok(days)
    }
}

/// Shared handle to a probed site.
pub type SharedSite = Arc<dyn SiteProbe>;

/// Compact `url (N days)` rendering for logs and reports.
pub struct SiteSummary<'a>(pub &'a dyn SiteProbe);

impl fmt::Display for SiteSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} days)", self.0.config().url, self.0.days_left())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSite;

    #[tokio::test]
    async fn test_refresh_and_get_days_left() {
        let site = FakeSite::new("www.example.com", 12);
        assert_eq!(site.refresh_and_get_days_left().await.unwrap(), 12);
        assert_eq!(site.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_certificate_is_an_error() {
        let site = FakeSite::new("www.example.com", 40).with_valid(false);
        let err = site.refresh_and_get_days_left().await.unwrap_err();
        assert!(err.to_string().contains("www.example.com"));

        // Expired certificates are reported, not rejected
        let expired = FakeSite::new("old.example.com", 0).with_valid(false);
        assert_eq!(expired.refresh_and_get_days_left().await.unwrap(), 0);
    }

    #[test]
    fn test_summary() {
        let site = FakeSite::new("www.example.com", 3);
        assert_eq!(SiteSummary(&site).to_string(), "www.example.com (3 days)");
    }
}
