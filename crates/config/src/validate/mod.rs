//! Configuration validation.
//!
//! Checks are split by what they need:
//! - [`validate_references`] and [`lint_config`] only look at the
//!   configuration itself and always run.
//! - [`validate_certificates`] reads the certificate store and the deployed
//!   certificate files.
//! - [`validate_remote_hosts`] opens TCP connections to remote updaters.

use std::fmt;

mod certs;
mod lint;
mod network;
mod references;

pub use certs::validate_certificates;
pub use lint::lint_config;
pub use network::validate_remote_hosts;
pub use references::validate_references;

/// Area a validation error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A name refers to nothing (notifier, updater)
    Reference,
    /// A collaborator entry is incomplete
    Collaborator,
    /// A site entry is malformed
    Site,
    /// Rate limits are inconsistent
    Limits,
    /// Certificate files or store
    Certificate,
    /// Remote host reachability
    Network,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Reference => "reference",
            ErrorCategory::Collaborator => "collaborator",
            ErrorCategory::Site => "site",
            ErrorCategory::Limits => "limits",
            ErrorCategory::Certificate => "certificate",
            ErrorCategory::Network => "network",
        };
        f.write_str(label)
    }
}

/// A problem that prevents the configuration from being used.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Something worth an operator's attention that does not block startup.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Accumulated errors and warnings.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Append another result's findings.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// One error per line.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
