//! Error types for the renewal core and its collaborators.

use std::fmt;
use thiserror::Error;

/// Failure reported by a collaborator (prober, updater, notifier, backend,
/// certificate authority). Concrete collaborators box their own error types.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for renewal operations.
pub type RenewalResult<T> = Result<T, RenewalError>;

/// Steps of a single site renewal, in order.
///
/// A renewal that fails is `Aborted` at the step it was attempting; there is
/// no rollback of steps already completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalStage {
    Pending,
    ChallengeBackendResolved,
    ChallengeConfigured,
    CertificateIssued,
    Deployed,
    Reloaded,
    Notified,
}

impl RenewalStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenewalStage::Pending => "pending",
            RenewalStage::ChallengeBackendResolved => "challenge_backend_resolved",
            RenewalStage::ChallengeConfigured => "challenge_configured",
            RenewalStage::CertificateIssued => "certificate_issued",
            RenewalStage::Deployed => "deployed",
            RenewalStage::Reloaded => "reloaded",
            RenewalStage::Notified => "notified",
        }
    }
}

impl fmt::Display for RenewalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a site renewal.
#[derive(Debug, Error)]
pub enum RenewalError {
    /// No configured challenge backend is authoritative for the site.
    #[error("no DNS challenge backend is authoritative for {url}")]
    NoChallengeBackend { url: String },

    /// The certificate authority rejected the challenge backend.
    #[error("failed to configure challenge backend '{backend}': {source}")]
    ChallengeConfiguration {
        backend: String,
        #[source]
        source: CollaboratorError,
    },

    /// Issuance was refused or failed.
    #[error("certificate issuance for {hostname} failed: {source}")]
    Issuance {
        hostname: String,
        #[source]
        source: CollaboratorError,
    },

    /// Copying the material to the target server failed.
    #[error("deployment through updater '{updater}' failed: {source}")]
    Deployment {
        updater: String,
        #[source]
        source: CollaboratorError,
    },

    /// The target service could not be reloaded.
    #[error("service reload through updater '{updater}' failed: {source}")]
    Reload {
        updater: String,
        #[source]
        source: CollaboratorError,
    },

    /// The success notification could not be delivered.
    #[error(transparent)]
    Notification(#[from] NotifyError),
}

impl RenewalError {
    /// Step the renewal was attempting when it failed.
    pub fn stage(&self) -> RenewalStage {
        match self {
            RenewalError::NoChallengeBackend { .. } => RenewalStage::Pending,
            RenewalError::ChallengeConfiguration { .. } => RenewalStage::ChallengeBackendResolved,
            RenewalError::Issuance { .. } => RenewalStage::ChallengeConfigured,
            RenewalError::Deployment { .. } => RenewalStage::CertificateIssued,
            RenewalError::Reload { .. } => RenewalStage::Deployed,
            RenewalError::Notification(_) => RenewalStage::Reloaded,
        }
    }
}

/// A notifier failed to deliver a message.
#[derive(Debug, Error)]
#[error("notifier '{notifier}' failed to deliver to '{destination}': {source}")]
pub struct NotifyError {
    pub notifier: String,
    pub destination: String,
    #[source]
    pub source: CollaboratorError,
}

/// Failure running an external program.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// A collaborator could not be built from its configuration.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("{kind} '{name}' is missing required field '{field}'")]
    MissingField {
        kind: &'static str,
        name: String,
        field: &'static str,
    },

    #[error("{kind} '{name}' has an invalid '{field}': {reason}")]
    InvalidField {
        kind: &'static str,
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Storage(#[from] crate::acme::StorageError),
}
