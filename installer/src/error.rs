//! Error types for the pantry installer pipeline.
//!
//! Each stage reports its own error type; [`InstallerError`] wraps them so a
//! caller installing many packages can record one package's failure and carry
//! on with the next.

use crate::cache::CacheError;
use crate::extract::ExtractionError;
use crate::fetch::FetchError;
use crate::runner::RunError;
use pantry_common::ExpansionError;
use thiserror::Error;

/// Errors that can occur while installing a single package.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// A URL, path, or argument template could not be expanded.
    #[error("template expansion failed: {0}")]
    Expansion(#[from] ExpansionError),

    /// The artifact could not be fetched into the cache.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The cached archive could not be unpacked.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// The installer could not be started or reported failure.
    #[error("installer failed: {0}")]
    Run(#[from] RunError),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl From<FetchError> for InstallerError {
    fn from(err: FetchError) -> Self {
        Self::Cache(CacheError::Fetch(err))
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;
