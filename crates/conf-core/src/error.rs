//! Error taxonomy for the commit pipeline
//!
//! One error type per stage. The driver only ever wraps a stage error into
//! `CommitError`, attaching the stage name; it never rewrites the message.

use thiserror::Error;

/// Top-level error reported for one pipeline run
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("extract: {0}")]
    Extract(#[from] ExtractionError),

    #[error("verify: {0}")]
    Validation(#[from] ConfigError),

    #[error("generate: {0}")]
    Generation(#[from] GenerationError),

    #[error("apply: {0}")]
    Apply(#[from] ApplyError),
}

/// Errors while reading the configuration tree into a record
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no instance identifier supplied for feature '{feature}'")]
    MissingIdentifier { feature: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// A record-level invariant was violated
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("device {device} does not exist")]
    DeviceMissing { device: String },

    #[error("{message}")]
    Invariant { message: String },
}

/// Artifact write or delete failed
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to remove artifact {path}: {source}")]
    Remove {
        path: String,
        source: std::io::Error,
    },
}

/// An externally observable operation failed
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("loading kernel module {module} failed")]
    ModuleLoad { module: String },

    #[error("service {unit} failed to {action}: {detail}")]
    Service {
        unit: String,
        action: String,
        detail: String,
    },

    #[error("VRF {vrf} does not exist")]
    VrfMissing { vrf: String },

    #[error("changing ownership of {path} failed: {detail}")]
    Ownership { path: String, detail: String },

    #[error("command '{command}' failed: {detail}")]
    Command { command: String, detail: String },
}
