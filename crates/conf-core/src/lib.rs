//! netconfd core
//!
//! Shared types for the four-stage commit pipeline: the error taxonomy
//! and the record contract every feature handler produces and consumes.

pub mod error;
pub mod record;

pub use error::{ApplyError, CommitError, ConfigError, ExtractionError, GenerationError};
pub use record::FeatureRecord;

/// Result type for commit pipeline operations
pub type Result<T> = std::result::Result<T, CommitError>;
