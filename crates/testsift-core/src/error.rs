//! Error taxonomy for testsift selection operations.

use thiserror::Error;

/// Errors produced by selection operations.
///
/// Only conditions the pipeline cannot recover from surface here. Recoverable
/// conditions (missing state file, malformed state records, resolver
/// failures, exhausted build history) are handled in place: the pipeline
/// falls back and logs instead of failing the build.
#[derive(Debug, Error)]
pub enum Error {
    #[error("manifest section error: {0}")]
    ManifestSection(String),

    #[error("resolver error: {0}")]
    Resolver(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for testsift operations.
pub type Result<T> = std::result::Result<T, Error>;
