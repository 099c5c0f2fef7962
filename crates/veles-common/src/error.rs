//! Error types for veles-common.

use thiserror::Error;

/// Common error type for Veles operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of source reached while reading.
    #[error("unexpected end of source: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: u64, available: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed game version string.
    #[error("invalid version string: {0:?}")]
    InvalidVersion(String),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
