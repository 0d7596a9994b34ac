//! Configuration loading errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating, reading or parsing a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no config.kdl, config.toml or config.json found in {0:?}")]
    NotFound(PathBuf),

    #[error("unsupported configuration format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("KDL syntax error: {0}")]
    KdlSyntax(#[from] kdl::KdlError),

    #[error("invalid KDL configuration: {0}")]
    Kdl(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration is invalid:\n{0}")]
    Invalid(String),
}
