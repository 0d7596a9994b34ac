//! Certificate authority client
//!
//! Issuance goes through an ACME client that publishes DNS-01 records via
//! the selected [`ChallengeBackend`] and writes the resulting material into
//! the [`CertificateStore`].
//!
//! # Components
//!
//! - [`CertificateAuthority`] - the capability the renewal workflow drives
//! - [`CommandAuthority`] - drives an external lego-compatible ACME tool
//! - [`CertificateStore`] - on-disk material shared with the updaters
//!
//! # Example
//!
//! ```kdl
//! certificates-root "/var/lib/certkeeper"
//!
//! acme {
//!     email "admin@example.com"
//!     command "/usr/local/bin/lego"
//!     staging #false
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::challenge::ChallengeBackend;
use crate::errors::CollaboratorError;

mod command;
mod error;
mod storage;

pub use command::CommandAuthority;
pub use error::StorageError;
pub use storage::{CertificateMeta, CertificateStore, MaterialPaths, StoredMaterial};

/// Client of the certificate authority.
///
/// The challenge backend is set before each issuance and stays in effect
/// until replaced.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Use `backend` for DNS-01 challenges from now on
    async fn set_challenge_backend(
        &self,
        backend: Arc<dyn ChallengeBackend>,
    ) -> Result<(), CollaboratorError>;

    /// Obtain a certificate for `hostname` and store it
    async fn request_certificate(&self, hostname: &str) -> Result<(), CollaboratorError>;
}
