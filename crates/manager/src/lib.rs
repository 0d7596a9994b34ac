//! Certkeeper Library
//!
//! Rate-limit aware TLS certificate renewal for fleets of sites.
//!
//! Sites are grouped by registrable domain, admission control decides which
//! of them may be renewed without exceeding the certificate authority's
//! weekly quotas, and each selected site goes through issuance, deployment
//! and service reload. Outcomes are routed to operators by category.
//!
//! - **Indexing**: [`index_sites`] groups probed sites by domain, most urgent first
//! - **Admission control**: [`RateLimitPolicy`] excludes domains and caps selections
//! - **Renewal**: [`CertManager`] runs the per-site workflow and whole cycles
//! - **Notification**: [`NotificationRouter`] maps outcome categories to recipients
//! - **Collaborators**: probers, updaters, notifiers, DNS backends and the ACME
//!   client, built from configuration by [`build_collaborators`]
//!
//! # Example
//!
//! ```ignore
//! use certkeeper::{build_collaborators, index_sites, init_multi, CertManager};
//! use certkeeper_config::Config;
//!
//! let config = Config::from_dir("/etc/certkeeper/")?;
//! let collaborators = build_collaborators(&config)?;
//! let sites = init_multi(&config.sites).await;
//!
//! let manager = CertManager::new(
//!     config.manager.clone(),
//!     collaborators.updaters,
//!     index_sites(&sites),
//!     collaborators.notifiers,
//!     collaborators.backends,
//!     collaborators.authority,
//! );
//! let report = manager.parse_sites().await;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod acme;
pub mod challenge;
pub mod coordinator;
pub mod errors;
pub mod factory;
pub mod index;
pub mod notify;
pub mod policy;
pub mod probe;
pub mod scheduler;
pub mod site;
pub mod updater;

mod process;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Errors
pub use errors::{
    CollaboratorError, CommandError, FactoryError, NotifyError, RenewalError, RenewalResult,
    RenewalStage,
};

// Renewal core
pub use coordinator::{CertManager, CycleReport, SiteFailure};
pub use index::{index_sites, DomainGroup};
pub use policy::{Exclusion, RateLimitPolicy, Selection};
pub use notify::{NotificationRouter, Notifier, Outcome};

// Collaborators
pub use acme::{CertificateAuthority, CertificateStore, CommandAuthority};
pub use challenge::ChallengeBackend;
pub use factory::{build_collaborators, Collaborators};
pub use probe::{init_multi, FileProbe};
pub use site::{SharedSite, SiteProbe};
pub use updater::CertificateUpdater;

// Driver
pub use scheduler::RenewalScheduler;
