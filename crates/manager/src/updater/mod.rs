//! Certificate deployment.
//!
//! An updater copies a site's issued material from the certificate store to
//! the site's configured locations on one server, then reloads the service
//! there. Sites are matched to updaters by server identifier; several
//! updaters may share one.

use async_trait::async_trait;

use certkeeper_common::ServerId;

use crate::errors::CollaboratorError;
use crate::site::SiteProbe;

mod local;
mod remote;

pub use local::LocalUpdater;
pub use remote::RemoteUpdater;

/// Deploys certificate material to one server.
#[async_trait]
pub trait CertificateUpdater: Send + Sync {
    /// Server identifier sites refer to
    fn name(&self) -> &ServerId;

    /// Copy the site's stored material to its configured locations
    async fn deploy_material(&self, site: &dyn SiteProbe) -> Result<(), CollaboratorError>;

    /// Make the served certificate take effect
    async fn reload_service(&self) -> Result<(), CollaboratorError>;
}
