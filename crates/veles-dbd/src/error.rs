//! Error types for definition parsing.

use thiserror::Error;
use veles_common::GameVersion;

/// Errors that can occur when parsing definition documents or building
/// schemas from them.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is malformed.
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A definition row names a column the COLUMNS block does not define.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A definition declares an array too large to describe.
    #[error("array length out of range for column: {0}")]
    InvalidArrayLength(String),

    /// No version group matches the requested build.
    #[error("no definition matches build {0}")]
    NoSchemaForBuild(GameVersion),

    /// Schema construction failed.
    #[error("schema error: {0}")]
    Schema(#[from] veles_db::Error),
}

/// Result type for definition parsing.
pub type Result<T> = std::result::Result<T, Error>;
