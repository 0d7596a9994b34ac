//! Certificate store errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("certificate store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid certificate metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("no issued material for {host} (expected {path})")]
    MissingMaterial { host: String, path: PathBuf },

    #[error("invalid host name for the certificate store: {0:?}")]
    InvalidHost(String),
}
