//! Error types for uiparity configuration and data model

use thiserror::Error;

/// Result type alias using the uiparity common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading or validating declarative configuration.
///
/// Every variant is fatal at startup: a run never begins against a catalog
/// that failed to load.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to read {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("Unknown role '{role}' referenced by {referenced_by}")]
    UnknownRole { role: String, referenced_by: String },

    #[error("Override '{id}' has a malformed scope: {reason}")]
    MalformedOverride { id: String, reason: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
